//! Builds the response envelope from a step's result.

use crate::error::GateError;
use crate::executor::ExecOutcome;
use crate::memory;
use sqlgate_auth::AuthResult;
use sqlgate_core::envelope::{CacheStatus, ResponseEnvelope};

#[derive(Debug, Clone, Copy)]
pub struct EnvelopeBuilder {
    report_memory: bool,
}

impl Default for EnvelopeBuilder {
    fn default() -> Self {
        Self {
            report_memory: true,
        }
    }
}

impl EnvelopeBuilder {
    /// Builder that leaves `peak_memory_usage` out, for deterministic output.
    pub fn without_memory() -> Self {
        Self {
            report_memory: false,
        }
    }

    pub fn success(
        &self,
        outcome: ExecOutcome,
        auth: Option<&AuthResult>,
        cache: Option<CacheStatus>,
    ) -> ResponseEnvelope {
        let mut envelope = ResponseEnvelope::success(Some(outcome.data));
        envelope.affected_rows = outcome.affected_rows;
        envelope.extra = outcome.extra;
        if let Some(auth) = auth {
            envelope = envelope.with_auth_check(auth.auth_check());
        }
        if let Some(status) = cache {
            envelope = envelope.with_cache_status(status);
        }
        self.finish(envelope)
    }

    pub fn failure(&self, err: &GateError) -> ResponseEnvelope {
        let mut envelope = ResponseEnvelope::failure(err.code(), err.to_string());
        if let GateError::Authorization { auth_check, .. } = err {
            envelope = envelope.with_auth_check(auth_check.clone());
        }
        self.finish(envelope)
    }

    fn finish(&self, envelope: ResponseEnvelope) -> ResponseEnvelope {
        if self.report_memory {
            envelope.with_peak_memory(memory::peak_memory_usage())
        } else {
            envelope
        }
    }
}
