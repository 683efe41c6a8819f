//! Proofgame Server
//!
//! Without arguments, plays a short demo round against an in-memory ledger.
//! With `--serve`, exposes the ledger over WebSocket.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use proofgame::{
    config::GameConfig,
    core::{field::FieldElement, identity::{Address, QuestionId}},
    game::events::GameEventData,
    network::{auth::AuthConfig, server::{GameServer, ServerConfig}},
    Groth16Proof, DigestVerifier, GameLedger, VERSION,
};

/// Module address used by the bootstrapped question bank.
const BANK_ADDRESS: Address = Address::new([0xB0; 20]);

/// Governor used when none is configured.
const DEV_GOVERNOR: Address = Address::new([0x60; 20]);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Proofgame Server v{}", VERSION);

    let mut config = GameConfig::from_env().context("loading game config")?;
    if config.governors.is_empty() {
        warn!("No governors configured, using development governor {}", DEV_GOVERNOR);
        config.governors.push(DEV_GOVERNOR);
    }
    info!(
        "Lobby size {}, claimant binding {}, attempt limit {:?}",
        config.bank.lobby_size, config.bank.bind_claimant, config.bank.max_failed_attempts
    );

    let verifier = Arc::new(DigestVerifier::new());
    let ledger = GameLedger::bootstrap(&config, BANK_ADDRESS, verifier.clone())
        .context("bootstrapping ledger")?;
    info!("Question bank {} authorized", BANK_ADDRESS);

    match std::env::args().nth(1).as_deref() {
        Some("--serve") => serve(ledger, &config).await,
        Some(other) => bail!("unknown argument {:?} (expected --serve)", other),
        None => demo_round(ledger, &config, &verifier),
    }
}

async fn serve(ledger: GameLedger, config: &GameConfig) -> anyhow::Result<()> {
    let server_config = ServerConfig {
        lobby_wait_timeout: config.lobby_wait_timeout,
        ..ServerConfig::from_env().context("loading server config")?
    };
    let server = GameServer::new(server_config, AuthConfig::from_env(), ledger);
    server.run().await?;
    Ok(())
}

/// Demo: fill a lobby, reject a bogus proof, accept a real one.
fn demo_round(
    mut ledger: GameLedger,
    config: &GameConfig,
    verifier: &DigestVerifier,
) -> anyhow::Result<()> {
    info!("=== Starting Demo Round ===");

    let governor = *config.governors.first().context("no governor configured")?;
    let question = QuestionId::from_label("Q1")?;
    ledger.add_question(governor, BANK_ADDRESS, question, 5)?;
    info!("Added question {} at tier 5", question);

    let players: Vec<Address> = (0..config.bank.lobby_size as u8)
        .map(|i| Address::new([0x10 + i; 20]))
        .collect();
    for player in &players {
        let lobby = ledger.register(*player, *player, 5, BANK_ADDRESS)?;
        info!("Player {} joined {} ({:?})", player.short(), lobby, ledger.player_status(player));
    }

    let solver = *players.first().context("empty lobby")?;
    let assigned = ledger.get_lobby_question(&solver)?;
    info!("Lobby question: {}", assigned);

    let bogus = Groth16Proof::from_wire(
        [FieldElement::ZERO; 2],
        [[FieldElement::ZERO; 2]; 2],
        [FieldElement::ZERO; 2],
    );
    let engine_before = ledger.engine().state_digest();
    let accepted = ledger.answer_question(solver, BANK_ADDRESS, &bogus, assigned)?;
    // Only the bank's attempt counter moves on rejection
    info!(
        "Bogus proof accepted: {} (engine unchanged: {})",
        accepted,
        ledger.engine().state_digest() == engine_before
    );

    let bank = ledger.module(&BANK_ADDRESS).context("bank not deployed")?;
    let inputs = bank.public_inputs_for(&assigned, &solver)?;
    let proof = verifier.prove(bank.verification_key(), &inputs.to_field_elements(), b"demo-witness")?;
    let accepted = ledger.answer_question(solver, BANK_ADDRESS, &proof, assigned)?;
    info!("Valid proof accepted: {}", accepted);

    info!("=== Events ===");
    for event in ledger.events_since(0) {
        if let GameEventData::QuestionAnswered { player, question, .. } = &event.data {
            info!("#{} {} answered {}", event.seq, player.short(), question);
        } else {
            info!("#{} {:?}", event.seq, event.data);
        }
    }

    info!("Final state digest: {}", hex::encode(ledger.state_digest()));
    info!("Event chain intact: {}", ledger.engine().events().verify_chain());
    Ok(())
}
