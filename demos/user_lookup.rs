//! Look up a user and their friends, awaiting each step as a whole.
//!
//! Run with `RUST_LOG=awaitable_send=debug` to see the send lifecycle.

use awaitable_send::builder::{invoke, transition, MachineBuilder, StateBuilder};
use awaitable_send::core::WaitUntil;
use awaitable_send::error::ObserverError;
use awaitable_send::{create_awaitable_send, SendOptions};
use serde_json::{json, Value};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let machine = MachineBuilder::new("user-lookup")
        .initial("idle")
        .context(json!({ "userId": 42, "user": null, "friends": [] }))
        .state(StateBuilder::new("idle").on("LOOKUP", "gettingUser"))
        .state(
            StateBuilder::new("gettingUser").invoke(
                invoke("getUser", |context| {
                    let id = context["userId"].clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        Ok(json!({ "id": id, "name": "Main person", "friends": [12, 34] }))
                    }
                })
                .on_done(transition("gettingFriends").assign_payload("user")),
            ),
        )
        .state(
            StateBuilder::new("gettingFriends").invoke(
                invoke("getFriends", |context| {
                    let ids = context["user"]["friends"].clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        let friends: Vec<Value> = ids
                            .as_array()
                            .into_iter()
                            .flatten()
                            .map(|id| json!({ "id": id, "name": format!("Friend {id}") }))
                            .collect();
                        Ok(Value::Array(friends))
                    }
                })
                .on_done(transition("ready").assign_payload("friends")),
            ),
        )
        .state(StateBuilder::new("ready").on("LOOKUP", "gettingUser"))
        .build()?;

    // Settle as soon as the user record arrives.
    let early = create_awaitable_send(
        machine.clone(),
        SendOptions::new().wait_until(WaitUntil::invoke("getUser")),
    )?;
    let completion = early.send("LOOKUP").await?;
    println!("user: {}", completion.data.unwrap_or(Value::Null));

    // Settle once the machine rests again, printing each step on the way.
    let full = create_awaitable_send(
        machine,
        SendOptions::new().on_transition(|snapshot, event| async move {
            println!("  {} -> {}", event.event_type(), snapshot.value);
            Ok::<(), ObserverError>(())
        }),
    )?;
    let completion = full.send("LOOKUP").await?;
    println!(
        "settled in '{}' with {}",
        completion.snapshot.value,
        serde_json::to_string_pretty(&completion.snapshot.context)?
    );

    Ok(())
}
