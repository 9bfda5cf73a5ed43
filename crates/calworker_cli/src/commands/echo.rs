//! Echo command implementation.

use crate::worker::{connect, SimulatedServer};
use calworker_protocol::{Args, Value};
use calworker_service::CalendarService;
use std::sync::Arc;

/// Runs the echo command.
pub async fn run(args: &[String], json_wire: bool) -> Result<(), Box<dyn std::error::Error>> {
    let service = CalendarService::builder(Arc::new(SimulatedServer::default())).build()?;
    let client = connect(&service, json_wire);

    let args = Args::from(args.iter().map(|arg| parse_arg(arg)).collect::<Vec<_>>());
    let echoed = client.echo(args).await?;
    println!("{}", serde_json::to_string_pretty(&echoed)?);

    client.close().await?;
    Ok(())
}

fn parse_arg(arg: &str) -> Value {
    serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn args_parse_as_json_or_string() {
        assert_eq!(parse_arg("42"), json!(42));
        assert_eq!(parse_arg("{\"a\":true}"), json!({ "a": true }));
        assert_eq!(parse_arg("hello"), json!("hello"));
        assert_eq!(parse_arg("\"quoted\""), json!("quoted"));
    }

    #[tokio::test]
    async fn echo_over_both_wires() {
        for json_wire in [false, true] {
            let service = CalendarService::builder(Arc::new(SimulatedServer::default()))
                .build()
                .unwrap();
            let client = connect(&service, json_wire);
            let echoed = client
                .echo(Args::from(vec![json!(1), json!("a")]))
                .await
                .unwrap();
            assert_eq!(echoed, json!([1, "a"]));
        }
    }
}
