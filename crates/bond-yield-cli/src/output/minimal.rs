use serde_json::Value;

/// Result fields worth printing on their own, in order of priority.
const PRIORITY_KEYS: [&str; 4] = ["gross_yield_pct", "net_yield_pct", "value", "coupon_rate_pct"];

/// Print just the headline number of the output.
///
/// A yield report prints its gross yield, a normalization prints the
/// normalized value, and a list of cashflows prints one `date amount` line
/// per flow.
pub fn print_minimal(value: &Value) {
    let result = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    match result {
        Value::Object(map) => {
            for key in PRIORITY_KEYS {
                if let Some(val) = map.get(key).filter(|v| !v.is_null()) {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
            if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, format_minimal(val));
            }
        }
        Value::Array(items) => {
            for item in items {
                match (item.get("date"), item.get("amount"), item.get("value")) {
                    (Some(date), Some(amount), _) => {
                        println!("{} {}", format_minimal(date), format_minimal(amount))
                    }
                    (_, _, Some(val)) => println!("{}", format_minimal(val)),
                    _ => println!("{}", format_minimal(item)),
                }
            }
        }
        other => println!("{}", format_minimal(other)),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
