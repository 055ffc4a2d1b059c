//! Line-oriented operator console on stdin.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use vehicle_tracking::{MockPoint, TrackingHandle};

const HELP: &str = "\
commands:
  start | stop | refresh | toggle
  vehicles                 reload registered vehicles
  select <vehicle>         draw the vehicle's recent track
  clear                    remove the track
  mock <vehicle> <lat> <lng> <speed> <heading>
  purge <vehicle>          delete every stored point of a vehicle
  status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Start,
    Stop,
    Refresh,
    Vehicles,
    Select(String),
    Clear,
    Toggle,
    Mock(MockPoint),
    Purge(String),
    Status,
    Help,
    Quit,
}

/// Parses one console line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Action>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let action = match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("start", []) => Action::Start,
        ("stop", []) => Action::Stop,
        ("refresh", []) => Action::Refresh,
        ("vehicles", []) => Action::Vehicles,
        ("select", [vehicle_id]) => Action::Select((*vehicle_id).to_string()),
        ("clear", []) => Action::Clear,
        ("toggle", []) => Action::Toggle,
        ("mock", [vehicle_id, lat, lng, speed, heading]) => Action::Mock(MockPoint {
            vehicle_id: (*vehicle_id).to_string(),
            lat: number("lat", lat)?,
            lng: number("lng", lng)?,
            speed: number("speed", speed)?,
            heading: number("heading", heading)?,
        }),
        ("purge", [vehicle_id]) => Action::Purge((*vehicle_id).to_string()),
        ("status", []) => Action::Status,
        ("help" | "?", []) => Action::Help,
        ("quit" | "exit", []) => Action::Quit,
        (command, _) => bail!("unrecognised command `{command}`, try `help`"),
    };
    Ok(Some(action))
}

fn number(field: &str, value: &str) -> Result<f64> {
    value.parse().with_context(|| format!("{field} `{value}` is not a number"))
}

/// Reads commands until `quit`, end of input or Ctrl-C, then stops tracking.
pub async fn run(handle: TrackingHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match parse(&line) {
                    Ok(Some(Action::Quit)) => break,
                    Ok(Some(action)) => execute(&handle, action).await?,
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "invalid command"),
                }
            }
            _ = signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    handle.stop()?;
    Ok(())
}

async fn execute(handle: &TrackingHandle, action: Action) -> Result<()> {
    let result = match action {
        Action::Start => handle.start(),
        Action::Stop => handle.stop(),
        Action::Refresh => handle.refresh(),
        Action::Vehicles => handle.fetch_registered_vehicles(),
        Action::Select(vehicle_id) => handle.select_vehicle(vehicle_id),
        Action::Clear => handle.clear_track(),
        Action::Toggle => handle.toggle_visibility(),
        Action::Mock(point) => handle.submit_point(point).await,
        Action::Purge(vehicle_id) => handle.purge_vehicle(vehicle_id).await,
        Action::Status => {
            let view = handle.view();
            println!("{}", serde_json::to_string_pretty(&view).context("serializing view")?);
            Ok(())
        }
        Action::Help => {
            println!("{HELP}");
            Ok(())
        }
        Action::Quit => Ok(()),
    };

    if let Err(err) = result {
        warn!(error = %err, "command failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn simple_commands() {
        assert_eq!(parse("start").expect("should parse"), Some(Action::Start));
        assert_eq!(parse("  Toggle ").expect("should parse"), Some(Action::Toggle));
        assert_eq!(parse("select SC-1").expect("should parse"), Some(Action::Select("SC-1".into())));
        assert_eq!(parse("purge RTG-4").expect("should parse"), Some(Action::Purge("RTG-4".into())));
        assert_eq!(parse("").expect("should parse"), None);
    }

    #[test]
    fn mock_point() {
        let action = parse("mock SC-1 -36.84 174.76 12.5 270").expect("should parse");
        assert_eq!(
            action,
            Some(Action::Mock(MockPoint {
                vehicle_id: "SC-1".to_string(),
                lat: -36.84,
                lng: 174.76,
                speed: 12.5,
                heading: 270.0,
            }))
        );
    }

    #[test]
    fn rejects_bad_input() {
        let err = parse("mock SC-1 north 174.76 12.5 270").expect_err("should reject");
        assert_eq!(err.to_string(), "lat `north` is not a number");

        assert!(parse("select").is_err());
        assert!(parse("launch").is_err());
    }
}
