//! Structural checks for role and PBU identifiers
//!
//! Both formats are part of the wire contract and must not be loosened.

use crate::error::{RegistryError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ROLE_ID: Regex =
        Regex::new(r"^[A-Z]+\.[A-Za-z0-9_]+\.[A-Za-z0-9_]+$").expect("role id pattern");
    static ref PBU_ID: Regex =
        Regex::new(r"^PBU_[A-Z0-9_]+[A-Z_]+[A-Z_]+$").expect("pbu id pattern");
}

/// Segments of a `{APP}.{MODULE}.{ROLE_FUNCTION}` role identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleIdParts<'a> {
    pub app_code: &'a str,
    pub module_code: &'a str,
    pub role_function: &'a str,
}

pub fn validate_role_id(id: &str) -> Result<()> {
    if ROLE_ID.is_match(id) {
        Ok(())
    } else {
        Err(RegistryError::bad_request(format!(
            "invalid role id '{}': expected {{APP}}.{{MODULE}}.{{ROLE_FUNCTION}}",
            id
        )))
    }
}

pub fn validate_pbu_id(id: &str) -> Result<()> {
    if PBU_ID.is_match(id) {
        Ok(())
    } else {
        Err(RegistryError::bad_request(format!(
            "invalid PBU id '{}': expected PBU_{{RESOURCE}}_{{ACTION}}_{{SCOPE}}",
            id
        )))
    }
}

/// Validate and split a role identifier into its three segments
pub fn parse_role_id(id: &str) -> Result<RoleIdParts<'_>> {
    validate_role_id(id)?;
    let mut segments = id.splitn(3, '.');
    match (segments.next(), segments.next(), segments.next()) {
        (Some(app_code), Some(module_code), Some(role_function)) => Ok(RoleIdParts {
            app_code,
            module_code,
            role_function,
        }),
        _ => Err(RegistryError::bad_request(format!("invalid role id '{}'", id))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_role_ids() {
        assert!(validate_role_id("BILLING.INVOICES.APPROVER").is_ok());
        assert!(validate_role_id("HR.payroll_v2.viewer_1").is_ok());
    }

    #[test]
    fn test_invalid_role_ids() {
        for id in [
            "",
            "billing.INVOICES.APPROVER",
            "BILLING.INVOICES",
            "BILLING..APPROVER",
            "BILLING.INVOICES.APPROVER.EXTRA",
            "BILLING.INVOICES.APPROVER ",
            "BILLING.INV-OICES.APPROVER",
            "BILLING1.INVOICES.APPROVER",
        ] {
            let err = validate_role_id(id).unwrap_err();
            assert!(matches!(err, RegistryError::BadRequest(_)), "{}", id);
        }
    }

    #[test]
    fn test_valid_pbu_ids() {
        assert!(validate_pbu_id("PBU_INVOICE_READ_OWN").is_ok());
        assert!(validate_pbu_id("PBU_LEDGER2_WRITE_ALL").is_ok());
    }

    #[test]
    fn test_invalid_pbu_ids() {
        for id in [
            "invoice_read_own",
            "PBU_invoice_READ_OWN",
            "PBU_",
            "PBU_A",
            "XBU_INVOICE_READ_OWN",
            "PBU_INVOICE-READ-OWN",
        ] {
            let err = validate_pbu_id(id).unwrap_err();
            assert!(matches!(err, RegistryError::BadRequest(_)), "{}", id);
        }
    }

    #[test]
    fn test_parse_role_id() {
        let parts = parse_role_id("BILLING.INVOICES.APPROVER").unwrap();
        assert_eq!(parts.app_code, "BILLING");
        assert_eq!(parts.module_code, "INVOICES");
        assert_eq!(parts.role_function, "APPROVER");

        assert!(parse_role_id("nope").is_err());
    }
}
