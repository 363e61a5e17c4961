// src/validator.rs - Centralized validation module
use std::collections::HashMap;
use regex::Regex;
use lazy_static::lazy_static;
use crate::error::ApiError;
use crate::models::ReadyCameraBoxInput;

lazy_static! {
    static ref PART_UID_REGEX: Regex = Regex::new(r"^[A-Za-z]{4}-\d{6}-[A-Za-z]{5}$").unwrap();
}

pub const BOX_NO_MAX_LEN: usize = 100;

/// Upper bound for any single quantity and for what one box may hold.
/// Mirrored by the `product_boxes.parts_qty` CHECK constraint.
pub const MAX_QTY: i64 = 1_000_000_000;

// ==================== FIELD VALIDATORS ====================

pub struct FieldValidator;

impl FieldValidator {
    /// `AAAA-111111-AAAAA`
    pub fn part_uid(value: &str) -> Result<(), ApiError> {
        if PART_UID_REGEX.is_match(value) {
            Ok(())
        } else {
            Err(ApiError::BadRequest(format!(
                "The UID \"{}\" is not in the correct format (AAAA-111111-AAAAA).",
                value
            )))
        }
    }

    /// Trimmed, non-empty box number of bounded length
    pub fn box_no(value: &str) -> Result<String, ApiError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ApiError::bad_request("Box number is required"));
        }
        if trimmed.chars().count() > BOX_NO_MAX_LEN {
            return Err(ApiError::BadRequest(format!(
                "Box number must not exceed {} characters",
                BOX_NO_MAX_LEN
            )));
        }
        Ok(trimmed.to_string())
    }

    /// Quantity in `1..=MAX_QTY` from a loose JSON value (`5`, `"5"`). `None` otherwise.
    pub fn positive_qty(value: Option<&serde_json::Value>) -> Option<i64> {
        let qty = match value? {
            serde_json::Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_QTY as f64)
                    .map(|f| f as i64)
            }),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }?;
        (1..=MAX_QTY).contains(&qty).then_some(qty)
    }
}

// ==================== READY CAMERA BOXES ====================

/// A box whose UIDs passed format and in-request uniqueness checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedCameraBox {
    pub box_no: String,
    pub part_uids: Vec<String>,
}

/// Trims and checks every UID of a ready-camera submission.
///
/// A UID repeated inside one box is a 400; a UID repeated across boxes is a
/// 409 naming the box that already holds it.
pub fn check_camera_boxes(boxes: &[ReadyCameraBoxInput]) -> Result<Vec<CheckedCameraBox>, ApiError> {
    if boxes.is_empty() {
        return Err(ApiError::bad_request("Provide at least one box."));
    }

    let mut owner: HashMap<String, String> = HashMap::new();
    let mut checked = Vec::with_capacity(boxes.len());

    for input in boxes {
        let box_no = FieldValidator::box_no(&input.box_no)?;
        let mut uids: Vec<String> = Vec::with_capacity(input.part_uids.len());

        for raw in &input.part_uids {
            let uid = raw.trim();
            if uid.is_empty() {
                continue;
            }
            FieldValidator::part_uid(uid)?;

            if uids.iter().any(|u| u == uid) {
                return Err(ApiError::BadRequest(format!(
                    "The UID \"{}\" is already added in this box.",
                    uid
                )));
            }
            if let Some(other) = owner.get(uid) {
                return Err(uid_conflict(uid, other));
            }
            uids.push(uid.to_string());
        }

        if uids.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Box No. \"{}\" must contain at least one part UID.",
                box_no
            )));
        }

        for uid in &uids {
            owner.insert(uid.clone(), box_no.clone());
        }
        checked.push(CheckedCameraBox { box_no, part_uids: uids });
    }

    Ok(checked)
}

pub fn uid_conflict(uid: &str, box_no: &str) -> ApiError {
    ApiError::Conflict(format!(
        "The UID \"{}\" already exists in submitted Box No. \"{}\".",
        uid, box_no
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(box_no: &str, uids: &[&str]) -> ReadyCameraBoxInput {
        ReadyCameraBoxInput {
            box_no: box_no.to_string(),
            part_uids: uids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_part_uid_format() {
        assert!(FieldValidator::part_uid("ABCD-123456-EFGHI").is_ok());
        assert!(FieldValidator::part_uid("abcd-123456-efghi").is_ok());
        assert!(FieldValidator::part_uid("ABC-123456-EFGHI").is_err());
        assert!(FieldValidator::part_uid("ABCD-12345-EFGHI").is_err());
        assert!(FieldValidator::part_uid("ABCD-123456-EFGH1").is_err());
        assert!(FieldValidator::part_uid(" ABCD-123456-EFGHI").is_err());

        let err = FieldValidator::part_uid("bad").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The UID \"bad\" is not in the correct format (AAAA-111111-AAAAA)."
        );
    }

    #[test]
    fn test_positive_qty() {
        assert_eq!(FieldValidator::positive_qty(Some(&json!(5))), Some(5));
        assert_eq!(FieldValidator::positive_qty(Some(&json!("7"))), Some(7));
        assert_eq!(FieldValidator::positive_qty(Some(&json!(3.0))), Some(3));
        assert_eq!(FieldValidator::positive_qty(Some(&json!(2.5))), None);
        assert_eq!(FieldValidator::positive_qty(Some(&json!(0))), None);
        assert_eq!(FieldValidator::positive_qty(Some(&json!(-4))), None);
        assert_eq!(FieldValidator::positive_qty(Some(&json!("abc"))), None);
        assert_eq!(FieldValidator::positive_qty(None), None);
    }

    #[test]
    fn test_positive_qty_is_capped() {
        assert_eq!(FieldValidator::positive_qty(Some(&json!(MAX_QTY))), Some(MAX_QTY));
        assert_eq!(FieldValidator::positive_qty(Some(&json!(MAX_QTY + 1))), None);
        assert_eq!(FieldValidator::positive_qty(Some(&json!("9223372036854775807"))), None);
        assert_eq!(FieldValidator::positive_qty(Some(&json!(i64::MAX))), None);
        assert_eq!(FieldValidator::positive_qty(Some(&json!(u64::MAX))), None);
        assert_eq!(FieldValidator::positive_qty(Some(&json!(1e30))), None);
    }

    #[test]
    fn test_request_quantities_share_the_cap() {
        use crate::models::{BoxInput, ImportUploadRow};
        use ::validator::Validate;

        let box_input = |parts_qty| BoxInput { box_no: "B1".into(), parts_qty };
        assert!(box_input(MAX_QTY).validate().is_ok());
        assert!(box_input(MAX_QTY + 1).validate().is_err());

        let row = |qty| ImportUploadRow {
            parts_name: "Lens".into(),
            parts_code: "LN-1".into(),
            box_no: "B1".into(),
            qty,
        };
        assert!(row(MAX_QTY).validate().is_ok());
        assert!(row(MAX_QTY + 1).validate().is_err());
    }

    #[test]
    fn test_box_no() {
        assert_eq!(FieldValidator::box_no("  B1 ").unwrap(), "B1");
        assert!(FieldValidator::box_no("   ").is_err());
        assert!(FieldValidator::box_no(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_check_camera_boxes_trims_uids() {
        let boxes = vec![input(" B1 ", &[" ABCD-123456-EFGHI ", "WXYZ-000001-QWERT"])];
        let checked = check_camera_boxes(&boxes).unwrap();
        assert_eq!(checked[0].box_no, "B1");
        assert_eq!(checked[0].part_uids, vec!["ABCD-123456-EFGHI", "WXYZ-000001-QWERT"]);
    }

    #[test]
    fn test_duplicate_in_same_box_is_bad_request() {
        let boxes = vec![input("B1", &["ABCD-123456-EFGHI", "ABCD-123456-EFGHI"])];
        let err = check_camera_boxes(&boxes).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.to_string(), "The UID \"ABCD-123456-EFGHI\" is already added in this box.");
    }

    #[test]
    fn test_duplicate_across_boxes_is_conflict() {
        let boxes = vec![
            input("B1", &["ABCD-123456-EFGHI"]),
            input("B2", &["ABCD-123456-EFGHI"]),
        ];
        let err = check_camera_boxes(&boxes).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(
            err.to_string(),
            "The UID \"ABCD-123456-EFGHI\" already exists in submitted Box No. \"B1\"."
        );
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(check_camera_boxes(&[]).is_err());
        assert!(check_camera_boxes(&[input("B1", &[])]).is_err());
        assert!(check_camera_boxes(&[input("", &["ABCD-123456-EFGHI"])]).is_err());
    }
}
