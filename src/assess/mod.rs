//! Classifies a FISIS response. Pure; watermark decisions live in the monitor.

use crate::fisis::{ApiResponse, Record, SUCCESS_CODE};

/// `ApiError::code` used when the response has no `result` envelope.
pub const MISSING_ENVELOPE: &str = "missing";

#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    HasNewData(Vec<Record>),
    NoNewData,
    ApiError { code: String, message: String },
}

pub fn classify(response: &ApiResponse) -> Assessment {
    let Some(result) = &response.result else {
        return Assessment::ApiError {
            code: MISSING_ENVELOPE.to_string(),
            message: "response has no result envelope".to_string(),
        };
    };

    if result.err_cd != SUCCESS_CODE {
        return Assessment::ApiError {
            code: result.err_cd.clone(),
            message: result.err_msg.clone(),
        };
    }

    match &result.list {
        Some(list) if !list.is_empty() => Assessment::HasNewData(list.clone()),
        _ => Assessment::NoNewData,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fisis::parse_response;

    fn classify_json(body: &str) -> Assessment {
        classify(&parse_response(body).unwrap())
    }

    #[test]
    fn test_empty_list_is_no_new_data() {
        assert_eq!(
            classify_json(r#"{"result": {"err_cd": "000", "list": []}}"#),
            Assessment::NoNewData
        );
    }

    #[test]
    fn test_absent_list_is_no_new_data() {
        assert_eq!(
            classify_json(r#"{"result": {"err_cd": "000", "err_msg": "ok"}}"#),
            Assessment::NoNewData
        );
    }

    #[test]
    fn test_records_are_new_data() {
        let assessment =
            classify_json(r#"{"result": {"err_cd": "000", "list": [{"finance_nm": "A"}, {"finance_nm": "B"}]}}"#);
        match assessment {
            Assessment::HasNewData(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].text("finance_nm").as_deref(), Some("A"));
            }
            other => panic!("expected HasNewData, got {:?}", other),
        }
    }

    #[test]
    fn test_error_code_is_api_error() {
        assert_eq!(
            classify_json(r#"{"result": {"err_cd": "001", "err_msg": "bad request"}}"#),
            Assessment::ApiError {
                code: "001".to_string(),
                message: "bad request".to_string(),
            }
        );
    }

    #[test]
    fn test_error_code_wins_over_records() {
        let assessment =
            classify_json(r#"{"result": {"err_cd": "100", "err_msg": "invalid key", "list": [{"a": 1}]}}"#);
        assert!(matches!(assessment, Assessment::ApiError { ref code, .. } if code == "100"));
    }

    #[test]
    fn test_missing_envelope_is_api_error() {
        assert!(matches!(
            classify(&ApiResponse::default()),
            Assessment::ApiError { ref code, .. } if code == MISSING_ENVELOPE
        ));
        assert!(matches!(
            classify_json(r#"{"unexpected": true}"#),
            Assessment::ApiError { .. }
        ));
    }
}
