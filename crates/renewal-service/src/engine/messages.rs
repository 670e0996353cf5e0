//! User and operator message texts.

use renewal_core::{format_cents, Account, BillingSettings, ChargeResult};

fn with_instructions(mut text: String, settings: &BillingSettings) -> String {
    if let Some(instructions) = settings.payment_details.instructions() {
        text.push(' ');
        text.push_str(&instructions);
    }
    text
}

/// Outcome of a monthly charge, sent to the account holder.
#[must_use]
pub fn billing_outcome(result: &ChargeResult, price_cents: i64, settings: &BillingSettings) -> String {
    match result.new_due_date {
        Some(next) if result.success => format!(
            "Payment of {} succeeded. Access is extended until {}. Balance: {}.",
            format_cents(price_cents),
            next.format("%d.%m.%Y"),
            format_cents(result.new_balance_cents),
        ),
        _ => with_instructions(
            format!(
                "Insufficient funds for the {} subscription charge. Access will be suspended. Balance: {}.",
                format_cents(price_cents),
                format_cents(result.new_balance_cents),
            ),
            settings,
        ),
    }
}

/// Low-balance warning after a failed charge.
#[must_use]
pub fn balance_warning(account: &Account, settings: &BillingSettings) -> String {
    with_instructions(
        format!(
            "Your balance is negative or too low to pay for the subscription. Current balance: {}. Please top up to keep access.",
            format_cents(account.balance_cents),
        ),
        settings,
    )
}

/// Operator alert about a failed charge.
#[must_use]
pub fn debtor_alert(account: &Account) -> String {
    let contact = account.messaging_address.as_deref().unwrap_or("not linked");
    format!(
        "Debtor: {} (id {}, contact {}). Charge failed with balance {}. Access must be revoked manually.",
        account.name,
        account.id,
        contact,
        format_cents(account.balance_cents),
    )
}

/// Reminder about an upcoming charge the balance does not cover.
#[must_use]
pub fn reminder(account: &Account, days_before: u8, settings: &BillingSettings) -> String {
    let when = match days_before {
        0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        n => format!("in {n} days"),
    };
    with_instructions(
        format!(
            "Reminder: a charge of {} is due {when} and your balance is not enough. Current balance: {}.",
            format_cents(settings.subscription_price_cents),
            format_cents(account.balance_cents),
        ),
        settings,
    )
}

/// Operator alert when a scheduled job fails.
#[must_use]
pub fn job_failure_alert(job: &str, error: &str) -> String {
    format!("Scheduled job {job} failed: {error}")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use renewal_core::PaymentDetails;

    use super::*;

    fn settings(phone: Option<&str>) -> BillingSettings {
        let mut settings = BillingSettings::new(10_000).unwrap();
        settings.payment_details = PaymentDetails {
            phone: phone.map(str::to_string),
            ..PaymentDetails::default()
        };
        settings
    }

    #[test]
    fn success_mentions_next_date_and_balance() {
        let result = ChargeResult {
            success: true,
            new_due_date: NaiveDate::from_ymd_opt(2024, 2, 29),
            new_balance_cents: 15_000,
        };
        let text = billing_outcome(&result, 10_000, &settings(Some("+100")));
        assert!(text.contains("100.00"));
        assert!(text.contains("29.02.2024"));
        assert!(text.contains("150.00"));
        assert!(!text.contains("+100"));
    }

    #[test]
    fn failure_carries_payment_details() {
        let result = ChargeResult {
            success: false,
            new_due_date: None,
            new_balance_cents: 3_000,
        };
        let text = billing_outcome(&result, 10_000, &settings(Some("+100")));
        assert!(text.contains("Insufficient funds"));
        assert!(text.contains("30.00"));
        assert!(text.ends_with("Top up via phone +100."));
    }

    #[test]
    fn reminder_wording_per_horizon() {
        let account = Account::new("a", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let s = settings(None);
        assert!(reminder(&account, 0, &s).contains("due today"));
        assert!(reminder(&account, 1, &s).contains("in 1 day"));
        assert!(reminder(&account, 5, &s).contains("in 5 days"));
    }

    #[test]
    fn ghost_alert_says_not_linked() {
        let account = Account::new("ghost", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert!(debtor_alert(&account).contains("not linked"));
    }
}
