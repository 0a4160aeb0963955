//! `eventbell check`: one fetch/evaluate pass, printed instead of fired.

use chrono::Utc;

use eventbell_core::{Minute, NormalizedEvent};
use eventbell_providers::google::Consent;
use eventbell_server::{AppContext, LogActuator, PollLoop, should_fire};

use crate::config::ClientConfig;
use crate::error::ClientResult;

use super::connect;

/// Fetches every calendar once and prints each event with its trigger.
pub async fn check(config: &ClientConfig) -> ClientResult<()> {
    config.validate()?;

    let provider = connect(config, Consent::Allowed).await?;
    // The actuator is never fired here.
    let ctx = AppContext::new(config.poll_config(), Box::new(provider), Box::new(LogActuator));
    let now = Utc::now();
    let evaluation = PollLoop::new(ctx).evaluate(now).await?;

    println!(
        "{} events in the next {} days (now {})",
        evaluation.events.len(),
        config.reminder.window_days,
        Minute::from_utc(now),
    );
    for event in &evaluation.events {
        println!("{}", render(event, should_fire(event, now)));
    }
    if evaluation.due.is_empty() {
        println!("nothing fires now");
    }
    Ok(())
}

fn render(event: &NormalizedEvent, fires: bool) -> String {
    let trigger = event
        .trigger_minute()
        .map_or_else(|| "-".to_string(), |minute| minute.to_string());
    format!(
        "{} {} (ends {}, -{}m{}) {} [{}]",
        if fires { "*" } else { " " },
        trigger,
        event.end_minute,
        event.reminder_offset_minutes,
        if event.repeat { ", repeat" } else { "" },
        event.name,
        event.calendar_id,
    )
}
