//! Application metrics: one `Meter` with a pre-built instrument per plane
//! (Ingest, Upload Queue, Session Manager, Pipeline). Exported via OTLP to an
//! external collector when `OTEL_EXPORTER_OTLP_ENDPOINT` is configured.

use anyhow::Result;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider, UpDownCounter},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tracing::info;

/// Pre-built metrics instruments, grouped by the plane that emits them (§5).
#[derive(Clone)]
pub struct AppObservability {
    pub meter: Meter,

    // Ingest plane
    pub segments_received: Counter<u64>,
    pub segment_bytes_received: Counter<u64>,
    pub ingest_rejected: Counter<u64>,
    pub sessions_active: UpDownCounter<i64>,

    // Upload Queue
    pub uploads_enqueued: Counter<u64>,
    pub uploads_succeeded: Counter<u64>,
    pub uploads_retried: Counter<u64>,
    pub uploads_dead_lettered: Counter<u64>,
    pub upload_queue_depth: UpDownCounter<i64>,

    // Session Manager
    pub sessions_timed_out: Counter<u64>,
    pub sessions_processed: Counter<u64>,
    pub sessions_failed: Counter<u64>,

    // Pipeline
    pub pipeline_step_duration: Histogram<f64>,
    pub pipeline_steps_completed: Counter<u64>,
    pub pipeline_steps_skipped: Counter<u64>,
    pub pipeline_steps_failed: Counter<u64>,
    pub channel_duration_seconds: Histogram<f64>,
}

impl AppObservability {
    /// Builds the global meter provider and every pre-configured instrument.
    pub fn new(service_name: &str) -> Result<Self> {
        let provider = SdkMeterProvider::builder().build();
        global::set_meter_provider(provider.clone());
        let meter = provider.meter("capture-receiver");

        if let Ok(otlp_endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            info!(endpoint = %otlp_endpoint, service_name, "OpenTelemetry OTLP export configured");
        } else {
            info!(service_name, "OpenTelemetry configured for local metrics only");
        }

        Ok(Self::build_with_instruments(meter))
    }

    fn build_with_instruments(meter: Meter) -> Self {
        let segments_received = meter
            .u64_counter("segments_received_total")
            .with_description("Segment uploads accepted on /stream")
            .build();
        let segment_bytes_received = meter
            .u64_counter("segment_bytes_received_total")
            .with_description("Bytes received across all segment uploads")
            .build();
        let ingest_rejected = meter
            .u64_counter("ingest_rejected_total")
            .with_description("Segment uploads rejected (empty body, bad headers)")
            .build();
        let sessions_active = meter
            .i64_up_down_counter("sessions_receiving")
            .with_description("Sessions currently in the receiving state")
            .build();

        let uploads_enqueued = meter
            .u64_counter("uploads_enqueued_total")
            .with_description("Items pushed onto the upload queue")
            .build();
        let uploads_succeeded = meter
            .u64_counter("uploads_succeeded_total")
            .with_description("Object-store uploads that succeeded")
            .build();
        let uploads_retried = meter
            .u64_counter("uploads_retried_total")
            .with_description("Object-store uploads re-enqueued after a transient failure")
            .build();
        let uploads_dead_lettered = meter
            .u64_counter("uploads_dead_lettered_total")
            .with_description("Object-store uploads moved to the dead-letter directory")
            .build();
        let upload_queue_depth = meter
            .i64_up_down_counter("upload_queue_depth")
            .with_description("Current upload queue depth")
            .build();

        let sessions_timed_out = meter
            .u64_counter("sessions_timed_out_total")
            .with_description("Sessions auto-completed by inactivity timeout")
            .build();
        let sessions_processed = meter
            .u64_counter("sessions_processed_total")
            .with_description("Sessions that finished processing with at least one channel succeeding")
            .build();
        let sessions_failed = meter
            .u64_counter("sessions_failed_total")
            .with_description("Sessions that finished processing with every channel failing")
            .build();

        let pipeline_step_duration = meter
            .f64_histogram("pipeline_step_duration_seconds")
            .with_description("Duration of a single pipeline step execution")
            .build();
        let pipeline_steps_completed = meter
            .u64_counter("pipeline_steps_completed_total")
            .with_description("Pipeline steps that completed successfully")
            .build();
        let pipeline_steps_skipped = meter
            .u64_counter("pipeline_steps_skipped_total")
            .with_description("Pipeline steps skipped by should_run")
            .build();
        let pipeline_steps_failed = meter
            .u64_counter("pipeline_steps_failed_total")
            .with_description("Pipeline steps that failed terminally")
            .build();
        let channel_duration_seconds = meter
            .f64_histogram("channel_processing_duration_seconds")
            .with_description("Total wall-clock duration of one channel's pipeline run")
            .build();

        Self {
            meter,
            segments_received,
            segment_bytes_received,
            ingest_rejected,
            sessions_active,
            uploads_enqueued,
            uploads_succeeded,
            uploads_retried,
            uploads_dead_lettered,
            upload_queue_depth,
            sessions_timed_out,
            sessions_processed,
            sessions_failed,
            pipeline_step_duration,
            pipeline_steps_completed,
            pipeline_steps_skipped,
            pipeline_steps_failed,
            channel_duration_seconds,
        }
    }

    /// Records one step outcome against the Pipeline Runner's callback hooks.
    pub fn record_step_outcome(&self, step: &str, outcome: &str, duration_ms: Option<u64>) {
        let attrs = [KeyValue::new("step", step.to_string())];
        match outcome {
            "completed" => {
                self.pipeline_steps_completed.add(1, &attrs);
                if let Some(ms) = duration_ms {
                    self.pipeline_step_duration.record(ms as f64 / 1000.0, &attrs);
                }
            }
            "skipped" => self.pipeline_steps_skipped.add(1, &attrs),
            "failed" => self.pipeline_steps_failed.add(1, &attrs),
            _ => {}
        }
    }
}
