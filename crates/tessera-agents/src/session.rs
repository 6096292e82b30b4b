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

//! The render session: the explicit context that owns all scheduler state.

use crate::render_agent::{AgentStatus, RenderAgent, RenderContext, RenderMetrics, TickReport};
use std::sync::Arc;
use tessera_core::backend::RenderBackend;
use tessera_core::budget::ResourceBudget;
use tessera_core::error::{InputError, StoreError};
use tessera_core::registry::AssetRegistry;
use tessera_core::resource::ResourceHandle;
use tessera_core::settings::Settings;
use tessera_core::storage::BlobStore;
use tessera_core::{
    GraphInstance, InputValue, InstanceId, OutputId, OutputSlot, PackageDescriptor, PixelFormat,
};
use tessera_data::{dirty, EnqueueOutcome, InstanceKey, InstanceStore, Lane, RenderRequestQueue};
use tessera_io::{ContentCache, FsBlobStore};
use tessera_lanes::{PublishMetrics, ResultPublisher};
use tessera_telemetry::{MetricsError, MetricsRegistry};
use thiserror::Error;

/// Failure of a session operation.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The key does not refer to a live instance.
    #[error("no instance for key {0:?}")]
    UnknownInstance(InstanceKey),
    /// The instance has no output with this id.
    #[error("instance has no output '{0}'")]
    UnknownOutput(OutputId),
    /// The input mutation was rejected.
    #[error(transparent)]
    Input(#[from] InputError),
    /// The cache store could not be opened.
    #[error("failed to open the cache store: {0}")]
    Store(#[from] StoreError),
    /// Metrics could not be registered.
    #[error("failed to register metrics: {0}")]
    Metrics(#[from] MetricsError),
    /// The session was shut down.
    #[error("render session is shut down")]
    ShutDown,
}

/// Owns the instances, the request queue, the content cache, the backend, and
/// the render agent.
///
/// There is no global state: a host builds one session at startup, drives it
/// by calling [`tick`](Self::tick) once per frame, and shuts it down
/// explicitly. Every mutation happens through `&mut self`, on the host's tick
/// thread.
pub struct RenderSession {
    instances: InstanceStore,
    queue: RenderRequestQueue<InstanceKey>,
    cache: ContentCache,
    registry: Box<dyn AssetRegistry>,
    backend: Box<dyn RenderBackend>,
    agent: RenderAgent,
    metrics: MetricsRegistry,
    shut_down: bool,
}

impl RenderSession {
    /// Builds a session from explicit parts.
    pub fn new(
        settings: &Settings,
        mut backend: Box<dyn RenderBackend>,
        store: Box<dyn BlobStore>,
        registry: Box<dyn AssetRegistry>,
    ) -> Result<Self, SessionError> {
        backend.configure(&settings.backend_budget());
        let metrics = MetricsRegistry::new();
        let publisher = ResultPublisher::with_metrics(PublishMetrics::register(&metrics)?);
        let agent = RenderAgent::new(settings.scheduler.max_async_instances_per_tick, publisher)
            .with_metrics(RenderMetrics::register(&metrics)?);
        log::info!(
            "Render session started (batch limit {}, cache {})",
            agent.batch_limit(),
            if settings.cache.enabled { "enabled" } else { "disabled" }
        );
        Ok(Self {
            instances: InstanceStore::new(),
            queue: RenderRequestQueue::new(),
            cache: ContentCache::new(store, &settings.cache),
            registry,
            backend,
            agent,
            metrics,
            shut_down: false,
        })
    }

    /// Builds a session that caches under `settings.cache.directory` and
    /// derives asset policies from the settings.
    pub fn open(settings: &Settings, backend: Box<dyn RenderBackend>) -> Result<Self, SessionError> {
        let store = FsBlobStore::open(&settings.cache.directory)?;
        Self::new(
            settings,
            backend,
            Box::new(store),
            Box::new(settings.asset_table()),
        )
    }

    /// Instantiates a package under a fresh id and queues its initial render
    /// in the background lane.
    pub fn create_instance(&mut self, package: Arc<PackageDescriptor>) -> InstanceKey {
        self.create_instance_with_id(InstanceId::new(), package)
    }

    /// Instantiates a package under a persistent id, so results cached by a
    /// previous session can be restored.
    pub fn create_instance_with_id(
        &mut self,
        id: InstanceId,
        package: Arc<PackageDescriptor>,
    ) -> InstanceKey {
        let key = self.instances.insert(GraphInstance::with_id(id, package));
        self.queue.enqueue(key, Lane::Background);
        log::debug!("Created instance {id}");
        key
    }

    /// Instantiates a package under a persistent id with initial input
    /// values, then queues its render in the background lane.
    ///
    /// Unlike [`set_input`](Self::set_input), initial values do not revoke
    /// cache eligibility: a fresh instance has never been published.
    pub fn create_instance_with_inputs<I>(
        &mut self,
        id: InstanceId,
        package: Arc<PackageDescriptor>,
        inputs: I,
    ) -> Result<InstanceKey, SessionError>
    where
        I: IntoIterator<Item = (String, InputValue)>,
    {
        let mut instance = GraphInstance::with_id(id, package);
        for (name, value) in inputs {
            instance.set_input(&name, value)?;
        }
        let key = self.instances.insert(instance);
        self.queue.enqueue(key, Lane::Background);
        log::debug!("Created instance {id}");
        Ok(key)
    }

    /// Removes an instance, its pending requests, and its cache entries.
    ///
    /// If a render of it is in flight, the result is dropped when the batch
    /// completes.
    pub fn delete_instance(&mut self, key: InstanceKey) -> Option<GraphInstance> {
        let instance = self.instances.remove(key)?;
        self.queue.remove(key);
        if self.cache.is_open() {
            if let Err(e) = self.cache.remove_instance(instance.id()) {
                log::warn!("Failed to drop cache entries of {}: {e}", instance.id());
            }
        }
        log::debug!("Deleted instance {}", instance.id());
        Some(instance)
    }

    /// Looks up an instance.
    pub fn instance(&self, key: InstanceKey) -> Option<&GraphInstance> {
        self.instances.get(key)
    }

    /// Finds the key of an instance by its persistent id.
    pub fn key_of(&self, id: InstanceId) -> Option<InstanceKey> {
        self.instances.key_of(id)
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Assigns an input. A changed value dirties the dependent outputs and
    /// queues an interactive (priority) render. Returns whether the value
    /// changed.
    pub fn set_input(
        &mut self,
        key: InstanceKey,
        name: &str,
        value: InputValue,
    ) -> Result<bool, SessionError> {
        let instance = self.instance_mut(key)?;
        if !instance.set_input(name, value)? {
            return Ok(false);
        }
        dirty::mark_dirty(instance, name);
        self.request_if_dirty(key);
        Ok(true)
    }

    /// Dirties every enabled output, e.g. after an image the instance reads
    /// was reimported, and queues a priority render.
    pub fn invalidate(&mut self, key: InstanceKey) -> Result<(), SessionError> {
        dirty::mark_all_dirty(self.instance_mut(key)?);
        self.request_if_dirty(key);
        Ok(())
    }

    /// Binds an output to the resource its results are published into.
    ///
    /// A dirty output whose earlier publish had no valid target is queued
    /// again. An instance in flight is left alone; its batch publishes into
    /// the new binding.
    pub fn attach(
        &mut self,
        key: InstanceKey,
        output: &OutputId,
        resource: &ResourceHandle,
    ) -> Result<(), SessionError> {
        self.output_slot(key, output)?.attach(resource);
        if !self.queue.is_in_flight(key) {
            self.request_if_dirty(key);
        }
        Ok(())
    }

    /// Enables or disables an output. Re-enabling queues a render.
    pub fn set_output_enabled(
        &mut self,
        key: InstanceKey,
        output: &OutputId,
        enabled: bool,
    ) -> Result<(), SessionError> {
        let slot = self.output_slot(key, output)?;
        if enabled {
            slot.enable();
        } else {
            slot.disable();
        }
        self.request_if_dirty(key);
        Ok(())
    }

    /// Overrides the pixel format an output is published in.
    pub fn set_format_override(
        &mut self,
        key: InstanceKey,
        output: &OutputId,
        format: Option<PixelFormat>,
    ) -> Result<(), SessionError> {
        self.output_slot(key, output)?.set_format_override(format);
        self.request_if_dirty(key);
        Ok(())
    }

    /// Explicitly requests a render, e.g. to recover outputs the backend
    /// failed to produce.
    pub fn request_render(
        &mut self,
        key: InstanceKey,
        lane: Lane,
    ) -> Result<EnqueueOutcome, SessionError> {
        if !self.instances.contains(key) {
            return Err(SessionError::UnknownInstance(key));
        }
        Ok(self.queue.enqueue(key, lane))
    }

    /// Runs one scheduler step. Cheap and non-blocking; call once per frame.
    pub fn tick(&mut self) -> TickReport {
        if self.shut_down {
            return TickReport::default();
        }
        let mut ctx = RenderContext {
            instances: &mut self.instances,
            queue: &mut self.queue,
            cache: &mut self.cache,
            registry: self.registry.as_mut(),
            backend: self.backend.as_mut(),
        };
        self.agent.tick(&mut ctx)
    }

    /// Renders the given instances to completion and publishes them before
    /// returning. Blocks; never call it from a frame tick.
    pub fn render_sync(&mut self, keys: &[InstanceKey]) -> Result<TickReport, SessionError> {
        if self.shut_down {
            return Err(SessionError::ShutDown);
        }
        let mut ctx = RenderContext {
            instances: &mut self.instances,
            queue: &mut self.queue,
            cache: &mut self.cache,
            registry: self.registry.as_mut(),
            backend: self.backend.as_mut(),
        };
        Ok(self.agent.render_sync(&mut ctx, keys))
    }

    /// Abandons every pending and in-flight render.
    pub fn cancel_all(&mut self) {
        let mut ctx = RenderContext {
            instances: &mut self.instances,
            queue: &mut self.queue,
            cache: &mut self.cache,
            registry: self.registry.as_mut(),
            backend: self.backend.as_mut(),
        };
        self.agent.cancel_all(&mut ctx);
    }

    /// Applies a scheduling strategy.
    pub fn apply_budget(&mut self, budget: ResourceBudget) {
        self.agent.apply_budget(budget);
    }

    /// The agent's status as of the last tick.
    pub fn report_status(&self) -> AgentStatus {
        self.agent.report_status()
    }

    /// Returns `true` when nothing is queued, deferred, or rendering.
    pub fn is_idle(&self) -> bool {
        !self.queue.has_work() && self.agent.running_job().is_none()
    }

    /// The render agent.
    pub fn agent(&self) -> &RenderAgent {
        &self.agent
    }

    /// The request queue.
    pub fn queue(&self) -> &RenderRequestQueue<InstanceKey> {
        &self.queue
    }

    /// The content cache.
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Mutable access to the content cache, e.g. to clear it.
    pub fn cache_mut(&mut self) -> &mut ContentCache {
        &mut self.cache
    }

    /// The host asset registry.
    pub fn registry(&self) -> &dyn AssetRegistry {
        self.registry.as_ref()
    }

    /// Metrics recorded by the scheduler and the publisher.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Cancels outstanding work and releases the cache. Idempotent.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.cancel_all();
        self.cache.shutdown();
        self.shut_down = true;
        log::info!("Render session shut down");
    }

    fn instance_mut(&mut self, key: InstanceKey) -> Result<&mut GraphInstance, SessionError> {
        self.instances
            .get_mut(key)
            .ok_or(SessionError::UnknownInstance(key))
    }

    fn output_slot(
        &mut self,
        key: InstanceKey,
        output: &OutputId,
    ) -> Result<&mut OutputSlot, SessionError> {
        self.instance_mut(key)?
            .output_mut(output)
            .ok_or_else(|| SessionError::UnknownOutput(output.clone()))
    }

    fn request_if_dirty(&mut self, key: InstanceKey) {
        let needs_render = self
            .instances
            .get(key)
            .is_some_and(GraphInstance::needs_render);
        if needs_render {
            let outcome = self.queue.enqueue(key, Lane::Priority);
            log::trace!("Render request for {key:?}: {outcome:?}");
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
