//! Aggregate commission line of a statement

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::traits::*;
use crate::types::*;

/// Label of the commission line
pub const COMMISSION_LINE_NAME: &str = "IN Commission line";

/// Reference tag of the commission line
pub const COMMISSION_REFERENCE: &str = "commission";

/// Build the single commission line for a statement, if the parser reports one
///
/// The line routes to the profile's commission partner and accounts and is
/// marked as already completed, so auto-completion leaves it alone. `rows` is
/// the parsed file; the default build only uses the parser's total.
pub fn build_commission_line(
    parser: &dyn StatementParser,
    _rows: &[RawRow],
    profile: &Profile,
    statement_id: &str,
    today: NaiveDate,
) -> Option<StatementLine> {
    let amount = parser
        .commission()
        .filter(|amount| *amount != BigDecimal::from(0))?;

    let mut line = StatementLine::new(
        statement_id.to_string(),
        COMMISSION_LINE_NAME.to_string(),
        today,
        amount,
    );
    line.partner_id = profile.partner_id.clone();
    line.account_id = profile.commission_account_id.clone();
    line.analytic_account_id = profile.commission_analytic_id.clone();
    line.line_type = LineType::General;
    line.reference = Some(COMMISSION_REFERENCE.to_string());
    // Auto-completion must not overwrite these values
    line.already_completed = true;

    Some(line)
}
