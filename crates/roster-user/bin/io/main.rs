//! Smoke test against running user servers.
//!
//! Adds a deterministic set of user/entity associations spread round-robin
//! across the given servers, then reads every user back and checks that the
//! returned entities match what was added.

use anyhow::{bail, ensure, Context};
use clap::Parser;
use roster_proto_schema::v1::user_service_client::UserServiceClient;
use roster_proto_schema::v1::{AddEntityRequest, GetEntitiesRequest};
use roster_user::telemetry::{init_tracing, LogFormat};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;
use tonic::transport::Channel;
use tonic::Code;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "roster-user-io")]
struct Args {
    /// Comma-separated server addresses.
    #[arg(
        long,
        env = "ROSTER_USER_IO_ADDRESSES",
        value_delimiter = ',',
        default_value = "127.0.0.1:50051"
    )]
    addresses: Vec<SocketAddr>,

    #[arg(long, env = "ROSTER_USER_IO_N_USERS", default_value_t = 8)]
    n_users: usize,

    #[arg(long, env = "ROSTER_USER_IO_N_ENTITIES", default_value_t = 32)]
    n_entities: usize,

    /// Upper bound of entities added per user.
    #[arg(long, env = "ROSTER_USER_IO_MAX_USER_ENTITIES", default_value_t = 8)]
    max_user_entities: usize,

    #[arg(long, env = "ROSTER_USER_IO_TIMEOUT_MS", default_value_t = 1000)]
    timeout_ms: u64,

    #[arg(long, env = "ROSTER_USER_IO_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn user_id(user: usize) -> String {
    format!("User-{user}")
}

fn entity_id(entity: usize) -> String {
    format!("Entity-{entity}")
}

/// Entities assigned to `user`: between 1 and `max_user_entities`, all distinct.
fn assigned_entities(user: usize, n_entities: usize, max_user_entities: usize) -> Vec<usize> {
    let n = user % max_user_entities + 1;
    (0..n).map(|k| (user + k) % n_entities).collect()
}

async fn connect(addresses: &[SocketAddr]) -> anyhow::Result<Vec<UserServiceClient<Channel>>> {
    let mut clients = Vec::with_capacity(addresses.len());
    for address in addresses {
        let client = UserServiceClient::connect(format!("http://{address}"))
            .await
            .with_context(|| format!("failed to connect to {address}"))?;
        clients.push(client);
    }
    Ok(clients)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, LogFormat::Text)?;

    ensure!(!args.addresses.is_empty(), "at least one address is required");
    ensure!(args.n_entities > 0, "n-entities must be positive");
    ensure!(args.max_user_entities > 0, "max-user-entities must be positive");
    ensure!(
        args.max_user_entities <= args.n_entities,
        "max-user-entities ({}) cannot exceed n-entities ({})",
        args.max_user_entities,
        args.n_entities
    );

    let timeout = Duration::from_millis(args.timeout_ms);
    let mut clients = connect(&args.addresses).await?;
    let n_clients = clients.len();

    let mut n_added = 0;
    for user in 0..args.n_users {
        for (k, entity) in assigned_entities(user, args.n_entities, args.max_user_entities)
            .into_iter()
            .enumerate()
        {
            let client = &mut clients[(user + k) % n_clients];
            let request = AddEntityRequest {
                user_id: user_id(user),
                entity_id: entity_id(entity),
            };
            let result = tokio::time::timeout(timeout, client.add_entity(request))
                .await
                .with_context(|| format!("add entity timed out for {}", user_id(user)))?;

            match result {
                Ok(_) => n_added += 1,
                // left over from an earlier run against the same servers
                Err(status) if status.code() == Code::AlreadyExists => {
                    debug!(user_id = %user_id(user), entity_id = %entity_id(entity), "already added");
                }
                Err(status) => {
                    bail!(
                        "add entity {} to {} failed: {status}",
                        entity_id(entity),
                        user_id(user)
                    )
                }
            }
        }
    }
    info!(n_users = args.n_users, n_added, "added entities");

    for user in 0..args.n_users {
        let client = &mut clients[user % n_clients];
        let request = GetEntitiesRequest {
            user_id: user_id(user),
        };
        let response = tokio::time::timeout(timeout, client.get_entities(request))
            .await
            .with_context(|| format!("get entities timed out for {}", user_id(user)))?
            .with_context(|| format!("get entities failed for {}", user_id(user)))?;

        let got: BTreeSet<String> = response.into_inner().entity_ids.into_iter().collect();
        let expected: BTreeSet<String> =
            assigned_entities(user, args.n_entities, args.max_user_entities)
                .into_iter()
                .map(entity_id)
                .collect();
        ensure!(
            got == expected,
            "entities for {} differ: expected {expected:?}, got {got:?}",
            user_id(user)
        );
    }
    info!(n_users = args.n_users, "verified entities for every user");

    Ok(())
}
