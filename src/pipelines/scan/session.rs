// SPDX-License-Identifier: GPL-3.0-only

//! Lifecycle-driven scan session
//!
//! The host calls [`ScanSession::on_active`], [`ScanSession::on_inactive`] and
//! [`ScanSession::on_terminated`] as its screen or view changes visibility.
//!
//! ```text
//!            on_active            on_inactive
//!   Idle ─────────────▶ Active ──────────────▶ Suspended
//!     │                   ▲ │                      │
//!     │                   │ └──────on_active───────┘
//!     │ on_terminated     │ on_terminated          │ on_terminated
//!     └───────────────▶ Stopped ◀──────────────────┘
//! ```

use super::decoder::Decoder;
use super::executor::AnalysisExecutor;
use super::pipeline::{FrameAnalysisPipeline, PipelineStats};
use super::result::ResultSink;
use super::state::{PipelineState, SharedState};
use crate::backends::camera::FrameSource;
use crate::config::ScannerConfig;
use crate::constants::{LensFacing, scanner};
use crate::errors::{SessionError, SourceError};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Collects the collaborators of a [`ScanSession`]
#[derive(Default)]
pub struct ScanSessionBuilder {
    source: Option<Box<dyn FrameSource>>,
    decoder: Option<Arc<dyn Decoder>>,
    sink: Option<Arc<dyn ResultSink>>,
    config: ScannerConfig,
}

impl ScanSessionBuilder {
    pub fn source(mut self, source: impl FrameSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn decoder(mut self, decoder: impl Decoder + 'static) -> Self {
        self.decoder = Some(Arc::new(decoder));
        self
    }

    pub fn sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Create the session in the idle state
    ///
    /// Missing collaborators are only reported when the session is activated.
    pub fn build(self) -> ScanSession {
        ScanSession {
            id: Uuid::new_v4(),
            config: self.config,
            source: self.source,
            decoder: self.decoder,
            sink: self.sink,
            state: SharedState::new(),
            executor: None,
            pipeline: None,
            subscribed: false,
            torch_on: false,
        }
    }
}

/// Binds frame analysis to an external lifecycle
///
/// Owns the analysis worker; the pipeline only holds a handle to it.
pub struct ScanSession {
    id: Uuid,
    config: ScannerConfig,
    source: Option<Box<dyn FrameSource>>,
    decoder: Option<Arc<dyn Decoder>>,
    sink: Option<Arc<dyn ResultSink>>,
    state: SharedState,
    executor: Option<AnalysisExecutor>,
    pipeline: Option<Arc<FrameAnalysisPipeline>>,
    subscribed: bool,
    torch_on: bool,
}

impl ScanSession {
    pub fn builder() -> ScanSessionBuilder {
        ScanSessionBuilder::default()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn lens_facing(&self) -> Option<LensFacing> {
        self.source.as_ref().map(|source| source.lens_facing())
    }

    /// The pipeline, once the session has been activated
    pub fn pipeline(&self) -> Option<&Arc<FrameAnalysisPipeline>> {
        self.pipeline.as_ref()
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline
            .as_ref()
            .map(|pipeline| pipeline.stats())
            .unwrap_or_default()
    }

    pub fn is_torch_on(&self) -> bool {
        self.torch_on
    }

    /// Owner became visible: start or resume analysis
    pub fn on_active(&mut self) -> Result<(), SessionError> {
        let previous = self.state.get();
        match previous {
            PipelineState::Stopped => return Err(SessionError::Terminated),
            PipelineState::Active => return Ok(()),
            PipelineState::Idle => self.start_pipeline()?,
            PipelineState::Suspended => {}
        }

        let Some(pipeline) = self.pipeline.as_ref().map(Arc::clone) else {
            return Err(SessionError::MissingComponent("pipeline"));
        };
        let Some(source) = self.source.as_mut() else {
            return Err(SessionError::MissingComponent("frame source"));
        };

        // Accept frames before the source starts pushing them
        self.state.set(PipelineState::Active);
        if let Err(e) = source.subscribe(pipeline) {
            warn!(session_id = %self.id, error = %e, "Failed to bind frame source");
            self.state.set(if previous == PipelineState::Idle {
                PipelineState::Suspended
            } else {
                previous
            });
            return Err(e.into());
        }
        self.subscribed = true;

        info!(session_id = %self.id, from = %previous, "Scan session active");
        Ok(())
    }

    /// Owner went out of view: stop taking frames, keep the worker
    pub fn on_inactive(&mut self) {
        if self.state.get() != PipelineState::Active {
            debug!(session_id = %self.id, state = %self.state.get(), "Inactive signal ignored");
            return;
        }

        self.state.set(PipelineState::Suspended);
        self.unbind_source();
        info!(session_id = %self.id, "Scan session suspended");
    }

    /// Owner is gone: release everything, for good
    pub fn on_terminated(&mut self) {
        let previous = self.state.set(PipelineState::Stopped);
        if previous == PipelineState::Stopped {
            return;
        }

        self.unbind_source();
        if self.torch_on {
            if let Some(source) = self.source.as_mut() {
                if let Err(e) = source.set_torch(false) {
                    debug!(session_id = %self.id, error = %e, "Failed to switch torch off");
                }
            }
            self.torch_on = false;
        }

        if let Some(mut executor) = self.executor.take() {
            executor.shutdown();
        }

        let stats = self.stats();
        info!(
            session_id = %self.id,
            from = %previous,
            submitted = stats.submitted,
            analysed = stats.analysed,
            successes = stats.successes,
            errors = stats.errors,
            "Scan session terminated"
        );
    }

    /// Switch the source's torch on or off
    pub fn set_torch(&mut self, on: bool) -> Result<(), SessionError> {
        if self.state.get() == PipelineState::Stopped {
            return Err(SessionError::Terminated);
        }
        let source = self
            .source
            .as_mut()
            .ok_or(SessionError::MissingComponent("frame source"))?;
        if !source.lens_facing().has_torch() {
            return Err(SessionError::TorchUnavailable);
        }

        match source.set_torch(on) {
            Ok(()) => {
                self.torch_on = on;
                debug!(session_id = %self.id, on, "Torch switched");
                Ok(())
            }
            Err(SourceError::Unsupported(_)) => Err(SessionError::TorchUnavailable),
            Err(e) => Err(e.into()),
        }
    }

    fn start_pipeline(&mut self) -> Result<(), SessionError> {
        if self.source.is_none() {
            return Err(SessionError::MissingComponent("frame source"));
        }
        let decoder = self
            .decoder
            .clone()
            .ok_or(SessionError::MissingComponent("decoder"))?;
        let sink = self
            .sink
            .clone()
            .ok_or(SessionError::MissingComponent("result sink"))?;

        let executor = AnalysisExecutor::start(scanner::WORKER_THREAD_NAME)?;
        let pipeline = FrameAnalysisPipeline::new(
            decoder,
            sink,
            executor.handle(),
            self.state.clone(),
            self.config.cooldown(),
        );

        debug!(
            session_id = %self.id,
            cooldown_ms = self.config.cooldown_ms,
            "Analysis pipeline created"
        );
        self.executor = Some(executor);
        self.pipeline = Some(Arc::new(pipeline));
        Ok(())
    }

    fn unbind_source(&mut self) {
        if !self.subscribed {
            return;
        }
        if let Some(source) = self.source.as_mut() {
            source.unsubscribe();
        }
        self.subscribed = false;
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        if self.state.get() != PipelineState::Stopped {
            debug!(session_id = %self.id, "ScanSession dropped, terminating");
            self.on_terminated();
        }
    }
}
