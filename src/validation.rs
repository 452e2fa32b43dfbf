use chrono::{DateTime, NaiveDate, Utc};

use crate::dto::orders::CreateOrderRequest;
use crate::error::FieldError;
use crate::models::PaymentMethod;

/// E.164-like: optional `+`, leading digit 1-9, up to 15 digits after it.
pub fn is_valid_phone(value: &str) -> bool {
    let digits = value.strip_prefix('+').unwrap_or(value);
    let mut chars = digits.chars();
    match chars.next() {
        Some(c) if ('1'..='9').contains(&c) => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    rest.len() <= 15 && rest.iter().all(|c| c.is_ascii_digit())
}

/// `HH:MM`, 24-hour clock.
pub fn is_valid_time(value: &str) -> bool {
    let Some((hh, mm)) = value.split_once(':') else {
        return false;
    };
    if hh.is_empty() || hh.len() > 2 || mm.len() != 2 {
        return false;
    }
    if !hh.chars().all(|c| c.is_ascii_digit()) || !mm.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let hours: u32 = hh.parse().unwrap_or(99);
    let minutes: u32 = mm.parse().unwrap_or(99);
    hours <= 23 && minutes <= 59
}

/// A bare `YYYY-MM-DD` is normalized to midnight UTC of that date;
/// anything else must be RFC 3339.
pub fn normalize_delivery_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Field-level precondition checks for order creation. Everything is
/// validated before any write happens; stock checks stay in the service
/// because they need the database.
pub fn validate_create_order(payload: &CreateOrderRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if payload.items.is_empty() {
        errors.push(FieldError::new(
            "items",
            "Order must contain at least one item",
        ));
    }
    for (idx, item) in payload.items.iter().enumerate() {
        if item.quantity < 1 || item.quantity > 100 {
            errors.push(FieldError::new(
                format!("items[{idx}].quantity"),
                "Quantity must be between 1 and 100",
            ));
        }
    }

    let address = payload.delivery_address.trim();
    if char_len(address) < 5 || char_len(address) > 500 {
        errors.push(FieldError::new(
            "deliveryAddress",
            "Delivery address must be 5 to 500 characters",
        ));
    }

    if !is_valid_phone(payload.customer_phone.trim()) {
        errors.push(FieldError::new("customerPhone", "Invalid phone format"));
    }

    let name_len = char_len(payload.customer_name.trim());
    if !(2..=100).contains(&name_len) {
        errors.push(FieldError::new(
            "customerName",
            "Customer name must be 2 to 100 characters",
        ));
    }

    if let Some(date) = payload.delivery_date.as_deref()
        && normalize_delivery_date(date).is_none()
    {
        errors.push(FieldError::new("deliveryDate", "Invalid delivery date"));
    }

    if let Some(time) = payload.delivery_time.as_deref()
        && !is_valid_time(time)
    {
        errors.push(FieldError::new(
            "deliveryTime",
            "Delivery time must be HH:MM",
        ));
    }

    if let Some(name) = payload.recipient_name.as_deref() {
        let len = char_len(name.trim());
        if !(2..=100).contains(&len) {
            errors.push(FieldError::new(
                "recipientName",
                "Recipient name must be 2 to 100 characters",
            ));
        }
    }

    if let Some(phone) = payload.recipient_phone.as_deref()
        && !is_valid_phone(phone.trim())
    {
        errors.push(FieldError::new(
            "recipientPhone",
            "Invalid recipient phone format",
        ));
    }

    if let Some(instructions) = payload.special_instructions.as_deref()
        && char_len(instructions) > 1000
    {
        errors.push(FieldError::new(
            "specialInstructions",
            "Special instructions must not exceed 1000 characters",
        ));
    }

    if let Some(message) = payload.gift_message.as_deref()
        && char_len(message) > 500
    {
        errors.push(FieldError::new(
            "giftMessage",
            "Gift message must not exceed 500 characters",
        ));
    }

    if let Some(method) = payload.payment_method.as_deref()
        && PaymentMethod::parse(method).is_none()
    {
        errors.push(FieldError::new("paymentMethod", "Invalid payment method"));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::orders::OrderItemRequest;
    use chrono::Timelike;
    use uuid::Uuid;

    fn valid_request() -> CreateOrderRequest {
        CreateOrderRequest {
            items: vec![OrderItemRequest {
                product_id: Uuid::new_v4(),
                quantity: 2,
            }],
            delivery_address: "Самовывоз".into(),
            delivery_date: None,
            delivery_time: None,
            customer_phone: "+79161234567".into(),
            customer_name: "Анна".into(),
            recipient_name: None,
            recipient_phone: None,
            special_instructions: None,
            payment_method: None,
            is_gift: None,
            gift_message: None,
            is_anonymous: None,
        }
    }

    #[test]
    fn phone_pattern() {
        assert!(is_valid_phone("+79161234567"));
        assert!(is_valid_phone("79161234567"));
        assert!(!is_valid_phone("+0123"));
        assert!(!is_valid_phone(""));
        assert!(!is_valid_phone("+7916-123"));
        assert!(!is_valid_phone("+79161234567890123"));
    }

    #[test]
    fn time_pattern() {
        assert!(is_valid_time("09:30"));
        assert!(is_valid_time("23:59"));
        assert!(is_valid_time("9:05"));
        assert!(!is_valid_time("24:00"));
        assert!(!is_valid_time("12:60"));
        assert!(!is_valid_time("12-30"));
    }

    #[test]
    fn bare_date_normalizes_to_midnight_utc() {
        let dt = normalize_delivery_date("2025-03-08").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-03-08T00:00:00+00:00");
        assert_eq!(dt.hour(), 0);

        let full = normalize_delivery_date("2025-03-08T14:30:00+03:00").unwrap();
        assert_eq!(full.hour(), 11);

        assert!(normalize_delivery_date("08.03.2025").is_none());
    }

    #[test]
    fn pickup_address_is_long_enough() {
        // The 5-char minimum exists precisely so "Самовывоз" passes.
        let errors = validate_create_order(&valid_request());
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn empty_items_rejected() {
        let mut req = valid_request();
        req.items.clear();
        let errors = validate_create_order(&req);
        assert!(errors.iter().any(|e| e.field == "items"));
    }

    #[test]
    fn quantity_bounds() {
        let mut req = valid_request();
        req.items[0].quantity = 101;
        let errors = validate_create_order(&req);
        assert!(errors.iter().any(|e| e.field == "items[0].quantity"));

        req.items[0].quantity = 0;
        let errors = validate_create_order(&req);
        assert!(errors.iter().any(|e| e.field == "items[0].quantity"));
    }

    #[test]
    fn optional_fields_checked_only_when_present() {
        let mut req = valid_request();
        req.delivery_time = Some("25:00".into());
        req.payment_method = Some("crypto".into());
        let errors = validate_create_order(&req);
        assert!(errors.iter().any(|e| e.field == "deliveryTime"));
        assert!(errors.iter().any(|e| e.field == "paymentMethod"));

        req.delivery_time = None;
        req.payment_method = Some("card".into());
        assert!(validate_create_order(&req).is_empty());
    }
}
