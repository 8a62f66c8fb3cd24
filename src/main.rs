//! Demo runner: one realtime-paced combat between the built-in demo
//! rosters, with the event stream logged and the result verified against
//! the reconstructor.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{info, warn};

use skirmish_engine::battle::{CombatConfig, Simulator, Verdict};
use skirmish_engine::synergy::descriptors_for;
use skirmish_engine::unit::{demo_team, Side};
use skirmish_engine::{config, replay, stream};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let seed = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0xC0FFEE);

    let team_a = demo_team("a");
    let team_b = demo_team("b");
    let mut synergies = descriptors_for(Side::A, &team_a);
    synergies.extend(descriptors_for(Side::B, &team_b));

    let mut sim = Simulator::new(CombatConfig {
        team_a,
        team_b,
        synergies,
        seed,
    })
    .expect("demo rosters are valid");

    let (eco_tx, mut eco_rx) = mpsc::unbounded_channel();
    sim.set_economy_sink(eco_tx);

    let mut events = stream::subscribe(&mut sim);
    let handle = sim.handle();

    info!(seed, "starting demo combat (ctrl-c cancels)");

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        handle.cancel();
    });

    let printer = tokio::spawn(async move {
        while let Some(ev) = events.next().await {
            info!(
                seq = ev.seq,
                t = format!("{:.1}", ev.timestamp),
                kind = ev.payload.kind_name(),
                "event"
            );
        }
    });

    let report = sim
        .run_paced(Duration::from_millis(config::TICK_INTERVAL_MS))
        .await
        .expect("combat completed");

    let _ = printer.await;

    match &report.verdict {
        Verdict::Winner(winner) => info!(
            winner = ?winner,
            duration = report.duration,
            survivors_a = report.survivors_a.len(),
            survivors_b = report.survivors_b.len(),
            star_sum = report.survivor_star_sum,
            loser_hp_damage = report.loser_hp_damage,
            "combat over"
        ),
        Verdict::Cancelled => info!("combat cancelled"),
    }

    while let Ok(reward) = eco_rx.try_recv() {
        info!(
            side = ?reward.side,
            trait_name = %reward.trait_name,
            kind = %reward.kind,
            amount = reward.amount,
            "economy reward"
        );
    }

    match replay::verify_log(&report.events) {
        Ok(rec) => info!(
            events = report.events.len(),
            snapshots = rec.snapshots_verified(),
            "event log verified by reconstructor"
        ),
        Err(e) => warn!("reconstruction mismatch, output untrusted: {e}"),
    }
}
