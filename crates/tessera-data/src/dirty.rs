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

//! Dirty tracking for output slots.
//!
//! A slot is dirty when its last published result no longer reflects the
//! instance's inputs. Marking also revokes the instance's cache eligibility:
//! a cached entry was computed from the old inputs and must not be read back
//! until a fresh result has been published.

use tessera_core::{GraphInstance, OutputSlot};

/// Marks dirty every enabled output that depends on `changed_input`.
///
/// Returns the number of slots that went from clean to dirty.
pub fn mark_dirty(instance: &mut GraphInstance, changed_input: &str) -> usize {
    let package = instance.package().clone();
    let mut newly_dirty = 0;
    for slot in instance.outputs_mut() {
        if !slot.is_enabled() || !package.input_affects(changed_input, slot.id()) {
            continue;
        }
        if !slot.is_dirty() {
            newly_dirty += 1;
        }
        slot.set_dirty(true);
    }
    instance.revoke_cache_eligibility();
    log::trace!(
        "Input '{}' of {} dirtied {} output(s)",
        changed_input,
        instance.id(),
        newly_dirty
    );
    newly_dirty
}

/// Marks every enabled output dirty, e.g. after a referenced image was
/// reimported.
pub fn mark_all_dirty(instance: &mut GraphInstance) -> usize {
    let mut newly_dirty = 0;
    for slot in instance.outputs_mut().filter(|slot| slot.is_enabled()) {
        if !slot.is_dirty() {
            newly_dirty += 1;
        }
        slot.set_dirty(true);
    }
    instance.bump_revision();
    instance.revoke_cache_eligibility();
    newly_dirty
}

/// Whether the slot's published result is stale.
pub fn is_dirty(slot: &OutputSlot) -> bool {
    slot.is_dirty()
}
