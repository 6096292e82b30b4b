// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod common;

use anyhow::Result;
use common::{base_color, counter, is_dirty, refreshes, session, spawn, FakeBackend};
use tessera_agents::RenderPhase;
use tessera_core::backend::RunFlags;
use tessera_core::budget::{ResourceBudget, StrategyId};
use tessera_core::InputValue;
use tessera_data::{EnqueueOutcome, Lane};

#[test]
fn test_tick_dispatches_then_publishes() -> Result<()> {
    // --- Test Setup ---
    let backend = FakeBackend::new();
    let mut session = session(&backend, 5);
    let (key, texture) = spawn(&mut session);
    // ---

    let report = session.tick();
    assert_eq!(report.drawn, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(session.agent().phase(), RenderPhase::Running);
    assert_eq!(session.queue().pending_len(), 0);
    assert!(session.queue().is_in_flight(key));
    assert_eq!(backend.state().runs[0].1, RunFlags::SCHEDULED);

    // Still running: nothing is published and nothing new is drawn.
    let report = session.tick();
    assert!(!report.completed_batch);
    assert_eq!(refreshes(&texture), 0);

    backend.finish_all();
    let report = session.tick();
    assert!(report.completed_batch);
    assert_eq!(report.published, 1);
    assert_eq!(refreshes(&texture), 1);
    assert!(!is_dirty(&session, key));
    assert!(session.is_idle());
    assert_eq!(session.agent().phase(), RenderPhase::Idle);
    Ok(())
}

#[test]
fn test_edits_jump_the_background_lane() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 1);
    let (a, _ta) = spawn(&mut session);
    let (b, _tb) = spawn(&mut session);
    let (c, _tc) = spawn(&mut session);

    // A queued key keeps its lane when an edit asks for priority.
    assert_eq!(
        session.request_render(b, Lane::Priority)?,
        EnqueueOutcome::AlreadyQueued
    );
    assert_eq!(session.queue().lane_of(b), Some(Lane::Background));

    session.tick();
    backend.finish_all();
    session.tick();
    assert!(!is_dirty(&session, a));

    session.set_input(a, "scale", InputValue::Float(2.0))?;
    assert_eq!(session.queue().lane_of(a), Some(Lane::Priority));

    backend.finish_all();
    session.tick();
    let id = |key| session.instance(key).map(|instance| instance.id());
    let expected: Vec<_> = [a, b, a].into_iter().filter_map(id).collect();
    assert_eq!(backend.pushed_ids(), expected);
    assert_eq!(session.queue().lane_of(c), Some(Lane::Background));
    Ok(())
}

#[test]
fn test_background_backlog_is_drawn_in_batches() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 5);
    let textures: Vec<_> = (0..12).map(|_| spawn(&mut session)).collect();

    let report = session.tick();
    assert_eq!(report.drawn, 5);
    assert_eq!(session.queue().pending_len(), 7);

    backend.finish_all();
    let report = session.tick();
    assert_eq!(report.published, 5);
    assert_eq!(report.drawn, 5);
    assert_eq!(session.queue().pending_len(), 2);

    backend.finish_all();
    let report = session.tick();
    assert_eq!(report.drawn, 2);

    backend.finish_all();
    session.tick();
    assert!(session.is_idle());
    assert!(textures.iter().all(|(_, texture)| refreshes(texture) == 1));
    assert_eq!(backend.push_count(), 12);
    Ok(())
}

#[test]
fn test_edit_during_render_is_deferred_and_rerendered() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 5);
    let (key, texture) = spawn(&mut session);

    session.tick();
    assert!(session.queue().is_in_flight(key));

    assert!(session.set_input(key, "scale", InputValue::Float(3.0))?);
    assert!(session.queue().is_deferred(key));

    // The stale result is shown but the output stays dirty and the
    // follow-up render is pushed in the same tick.
    backend.finish_all();
    let report = session.tick();
    assert_eq!(report.published, 1);
    assert_eq!(report.dispatched, 1);
    assert_eq!(refreshes(&texture), 1);
    assert!(is_dirty(&session, key));
    assert_eq!(session.cache().entry_count(), 0);

    let pushes = backend.state().pushes.clone();
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[0].revision, 0);
    assert_eq!(pushes[1].revision, 1);
    assert_eq!(pushes[1].inputs.get("scale"), Some(&InputValue::Float(3.0)));

    backend.finish_all();
    session.tick();
    assert!(!is_dirty(&session, key));
    assert_eq!(refreshes(&texture), 2);
    assert_eq!(session.cache().entry_count(), 1);
    Ok(())
}

#[test]
fn test_cancel_all_abandons_in_flight_work() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 5);
    let (key, texture) = spawn(&mut session);
    session.tick();
    let (_queued, _t) = spawn(&mut session);

    session.cancel_all();
    assert_eq!(backend.state().cancel_count, 1);
    assert!(session.is_idle());
    assert_eq!(session.agent().phase(), RenderPhase::Idle);

    backend.finish_all();
    let report = session.tick();
    assert_eq!(report.published, 0);
    assert!(!report.completed_batch);
    assert_eq!(refreshes(&texture), 0);
    assert!(is_dirty(&session, key));

    // Abandoned work is recovered by asking again.
    assert_eq!(
        session.request_render(key, Lane::Priority)?,
        EnqueueOutcome::Queued
    );
    Ok(())
}

#[test]
fn test_outputs_never_produced_stay_dirty() -> Result<()> {
    let backend = FakeBackend::new();
    backend.state().never_ready.insert(base_color());
    let mut session = session(&backend, 5);
    let (key, texture) = spawn(&mut session);

    session.tick();
    backend.finish_all();
    let report = session.tick();
    assert!(report.completed_batch);
    assert_eq!(report.not_ready, 1);
    assert_eq!(refreshes(&texture), 0);
    assert!(is_dirty(&session, key));
    assert!(session.is_idle());
    assert_eq!(counter(&session, "scheduler", "outputs_not_ready"), Some(1));
    Ok(())
}

#[test]
fn test_render_sync_publishes_before_returning() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 5);
    let (a, ta) = spawn(&mut session);
    let (b, tb) = spawn(&mut session);

    let report = session.render_sync(&[a, b])?;
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.published, 2);
    assert_eq!(refreshes(&ta), 1);
    assert_eq!(refreshes(&tb), 1);
    assert_eq!(backend.state().runs[0].1, RunFlags::RUN_FIRST);

    // Their background requests were consumed.
    assert!(session.queue().is_empty());
    assert!(session.is_idle());

    // Clean instances are not rendered again.
    let report = session.render_sync(&[a])?;
    assert_eq!(report.dispatched, 0);
    assert_eq!(backend.push_count(), 2);
    Ok(())
}

#[test]
fn test_render_sync_skips_in_flight_instances() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 5);
    let (key, _texture) = spawn(&mut session);

    session.tick();
    let report = session.render_sync(&[key])?;
    assert_eq!(report.drawn, 0);
    assert_eq!(report.dispatched, 0);
    assert_eq!(backend.push_count(), 1);
    Ok(())
}

#[test]
fn test_apply_budget_changes_batch_size() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 4);
    for _ in 0..6 {
        spawn(&mut session);
    }

    session.apply_budget(ResourceBudget {
        strategy_id: StrategyId::LowPower,
    });
    assert_eq!(session.agent().batch_limit(), 1);
    assert_eq!(session.tick().drawn, 1);

    session.apply_budget(ResourceBudget {
        strategy_id: StrategyId::HighPerformance,
    });
    assert_eq!(session.agent().batch_limit(), 12);
    backend.finish_all();
    assert_eq!(session.tick().drawn, 5);

    let status = session.report_status();
    assert_eq!(status.current_strategy, StrategyId::HighPerformance);
    assert_eq!(status.in_flight, 5);
    assert_eq!(status.pending, 0);
    assert_eq!(status.health_score, 1.0);
    Ok(())
}

#[test]
fn test_backlog_lowers_health_score() {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 1);
    for _ in 0..20 {
        spawn(&mut session);
    }
    session.tick();
    let status = session.report_status();
    assert_eq!(status.pending, 19);
    assert!(status.health_score < 0.5);
    assert!(status.message.contains("pending=19"));
}

#[test]
fn test_scheduler_metrics() -> Result<()> {
    let backend = FakeBackend::new();
    let mut session = session(&backend, 5);
    spawn(&mut session);
    spawn(&mut session);

    session.tick();
    backend.finish_all();
    session.tick();

    assert_eq!(counter(&session, "scheduler", "renders_dispatched"), Some(2));
    assert_eq!(counter(&session, "scheduler", "cache_misses"), Some(2));
    assert_eq!(counter(&session, "scheduler", "cache_hits"), Some(0));
    assert_eq!(counter(&session, "publisher", "outputs_published"), Some(2));
    Ok(())
}
