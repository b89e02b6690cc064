//! Symbol formatting for charting-platform import lists.

/// Map an exchange-qualified symbol to its TradingView form.
///
/// `SMART` routing carries no venue information, so the bare symbol is the
/// only honest answer there; unknown venues default to the NYSE prefix.
pub fn tv_symbol(symbol: &str, exchange: Option<&str>) -> String {
    let Some(exchange) = exchange else {
        return format!("NYSE:{symbol}");
    };
    let ex = exchange.to_ascii_uppercase();
    if ex == "SMART" {
        symbol.to_string()
    } else if ex.contains("NASDAQ") {
        format!("NASDAQ:{symbol}")
    } else if ex.contains("NYSE") {
        format!("NYSE:{symbol}")
    } else if ex.contains("AMEX") || ex.contains("ARCA") {
        format!("AMEX:{symbol}")
    } else {
        format!("NYSE:{symbol}")
    }
}
