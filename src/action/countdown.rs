//! Start/stop control of projector countdowns, shared by the poll actions.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::action::context::ActionContext;
use crate::action::error::ActionResult;
use crate::models::{Collection, Fqid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownCommand {
    /// Resume from the remaining time
    Start,
    /// Pause and keep the remaining time
    Stop,
    /// Pause and rewind to the default time
    Reset,
    /// Run from the default time
    Restart,
}

#[async_trait]
pub trait CountdownControl: Send + Sync {
    async fn control(
        &self,
        ctx: &mut ActionContext,
        countdown_id: u64,
        command: CountdownCommand,
    ) -> ActionResult<()>;
}

/// Writes countdown changes through `projector_countdown.update`.
///
/// A running countdown stores its end as a unix timestamp in
/// `countdown_time`, a paused one stores the remaining seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectorCountdownControl;

#[async_trait]
impl CountdownControl for ProjectorCountdownControl {
    async fn control(
        &self,
        ctx: &mut ActionContext,
        countdown_id: u64,
        command: CountdownCommand,
    ) -> ActionResult<()> {
        let countdown = ctx
            .datastore()
            .get(
                Fqid::new(Collection::ProjectorCountdown, countdown_id),
                &["default_time", "countdown_time", "running"],
            )
            .await?;
        let default_time = countdown.get("default_time").and_then(Value::as_f64).unwrap_or(0.0);
        let countdown_time = countdown.get("countdown_time").and_then(Value::as_f64);
        let running = countdown.get("running").and_then(Value::as_bool).unwrap_or(false);
        let now = now();

        let (running, countdown_time) = match command {
            CountdownCommand::Restart => (true, now + default_time),
            CountdownCommand::Start if running => return Ok(()),
            CountdownCommand::Start => (true, now + countdown_time.unwrap_or(default_time)),
            CountdownCommand::Stop if !running => return Ok(()),
            CountdownCommand::Stop => {
                let end = countdown_time.unwrap_or(now);
                (false, (end - now).max(0.0))
            }
            CountdownCommand::Reset => (false, default_time),
        };

        tracing::debug!(
            "Countdown {} {:?}: running={} countdown_time={}",
            countdown_id,
            command,
            running,
            countdown_time
        );
        ctx.execute_other_action(
            "projector_countdown.update",
            vec![json!({
                "id": countdown_id,
                "running": running,
                "countdown_time": countdown_time,
            })],
        )
        .await?;
        Ok(())
    }
}

fn now() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
