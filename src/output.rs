//! Streams typed models to a writer as they are produced.
//!
//! The pipeline is single-producer / single-consumer: the producer sends
//! models and errors on two channels, the consumer renders models as they
//! arrive and buffers errors for a trailing report. The model channel is
//! bounded at one entry, so the producer and the writer move in lock-step.
use std::io::Write;

use handlebars::Handlebars;
use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    errors::{Result, UnchainedError},
    model::{Extras, Model, Modeler},
};

/// Block heights attached to an `api` format response envelope.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub unripe: u64,
    pub ripe: u64,
    pub staging: u64,
    pub finalized: u64,
    pub client: u64,
}

/// Granular configuration of output details.
#[derive(Clone, Debug)]
pub struct OutputOptions {
    /// One of `json`, `api`, `csv`, `txt`, a single delimiter character, or
    /// a template (any string containing `{`).
    pub format: String,
    /// Print the raw pre-modeled record instead of the model.
    pub show_raw: bool,
    /// Admit optional fields into models.
    pub verbose: bool,
    /// Print a key row before the first item (ignored for JSON formats).
    pub show_keys: bool,
    pub chain: String,
    /// Attached to the `api` envelope when present.
    pub meta: Option<Meta>,
    /// Command context passed through to every model projection.
    pub extras: Extras,
}

impl Default for OutputOptions {
    fn default() -> Self {
        OutputOptions {
            format: "json".to_string(),
            show_raw: false,
            verbose: false,
            show_keys: true,
            chain: "mainnet".to_string(),
            meta: None,
            extras: Extras::new(),
        }
    }
}

fn separator_for(format: &str) -> Result<u8> {
    match format {
        "csv" => Ok(b','),
        "txt" => Ok(b'\t'),
        single if single.len() == 1 => Ok(single.as_bytes()[0]),
        other => Err(UnchainedError::Usage(format!("unknown format {}", other))),
    }
}

fn value_to_cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Re-indents a pretty-printed JSON blob so nested lines sit under the
/// current framing indent.
fn indent_block(text: &str, prefix: &str) -> String {
    text.replace('\n', &format!("\n{}", prefix))
}

fn render_model<W: Write>(
    w: &mut W,
    model: &Model,
    raw: Option<Value>,
    options: &OutputOptions,
    templates: &Handlebars,
    is_custom: bool,
    first: bool,
) -> Result<()> {
    let format = options.format.as_str();
    if format == "json" || format == "api" {
        if !first {
            w.write_all(b",")?;
        }
        if options.show_raw {
            if let Some(raw_value) = raw {
                let text = serde_json::to_string_pretty(&raw_value)?;
                w.write_all(indent_block(&text, "    ").as_bytes())?;
                return Ok(());
            }
        }
        let text = serde_json::to_string_pretty(&model.data)?;
        w.write_all(indent_block(&text, "    ").as_bytes())?;
        return Ok(());
    }

    if is_custom {
        let rendered = templates.render("custom", &Value::Object(model.data.clone()))?;
        w.write_all(rendered.as_bytes())?;
        w.write_all(b"\n")?;
        return Ok(());
    }

    let separator = separator_for(format)?;
    let mut rows = csv::WriterBuilder::new()
        .delimiter(separator)
        .from_writer(&mut *w);
    if options.show_keys && first {
        rows.write_record(&model.order)?;
    }
    let cells: Vec<String> = model
        .order
        .iter()
        .map(|key| value_to_cell(model.data.get(key)))
        .collect();
    rows.write_record(&cells)?;
    // Flush per item so the user gets data as it comes.
    rows.flush()?;
    Ok(())
}

/// Streams models and errors from `producer` to `w` in the chosen format.
///
/// JSON formats are framed so the overall output is one object with a
/// `data` array; `api` additionally carries `meta` and, when errors
/// accumulated, an `errors` array in arrival order. Other formats log
/// buffered errors after the stream ends.
///
/// Cancelling `ctx` abandons the stream and returns
/// [`UnchainedError::Cancelled`] immediately, without trailing writes.
pub async fn stream_many<M, W, F, Fut>(
    ctx: CancellationToken,
    w: &mut W,
    producer: F,
    options: OutputOptions,
) -> Result<()>
where
    M: Modeler,
    W: Write,
    F: FnOnce(mpsc::Sender<M>, mpsc::UnboundedSender<UnchainedError>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let (model_tx, mut model_rx) = mpsc::channel::<M>(1);
    let (error_tx, mut error_rx) = mpsc::unbounded_channel::<UnchainedError>();
    let producer_fut = producer(model_tx, error_tx);
    tokio::pin!(producer_fut);

    let format = options.format.clone();
    let is_json = format == "json" || format == "api";
    let is_custom = format.contains('{');
    let mut templates = Handlebars::new();
    if is_custom {
        // Plain text output, not HTML; and a bad template is a usage
        // problem, so fail before any output.
        templates.register_escape_fn(handlebars::no_escape);
        templates.register_template_string("custom", &format)?;
    } else if !is_json {
        separator_for(&format)?;
    }

    if is_json {
        w.write_all(b"{\n  \"data\": [\n    ")?;
    }

    let mut errs_to_report: Vec<String> = vec![];
    let mut first = true;
    let mut producer_done = false;
    let mut models_open = true;
    let mut errors_open = true;
    let mut render_result: Result<()> = Ok(());

    while models_open || errors_open {
        tokio::select! {
            // Cancellation wins over pending work, so the caller's error
            // comes back without further writes.
            biased;
            _ = ctx.cancelled() => {
                return Err(UnchainedError::Cancelled);
            }
            _ = &mut producer_fut, if !producer_done => {
                producer_done = true;
            }
            maybe_model = model_rx.recv(), if models_open => match maybe_model {
                Some(model) => {
                    let projected =
                        model.model(&options.chain, &format, options.verbose, &options.extras);
                    let outcome = render_model(
                        w,
                        &projected,
                        model.raw(),
                        &options,
                        &templates,
                        is_custom,
                        first,
                    );
                    first = false;
                    if let Err(e) = outcome {
                        render_result = Err(e);
                        models_open = false;
                        errors_open = false;
                    }
                }
                None => models_open = false,
            },
            maybe_err = error_rx.recv(), if errors_open => match maybe_err {
                Some(err) => errs_to_report.push(err.to_string()),
                None => errors_open = false,
            },
        }
    }

    if is_json {
        w.write_all(b"\n  ]")?;
        if format == "api" {
            if let Some(meta) = &options.meta {
                w.write_all(b",\n  \"meta\": ")?;
                let text = serde_json::to_string_pretty(meta)?;
                w.write_all(indent_block(&text, "  ").as_bytes())?;
            }
            if !errs_to_report.is_empty() {
                w.write_all(b",\n  \"errors\": ")?;
                let text = serde_json::to_string_pretty(&errs_to_report)?;
                w.write_all(indent_block(&text, "  ").as_bytes())?;
            }
        }
        w.write_all(b"\n}\n")?;
    }
    if format != "api" {
        for message in &errs_to_report {
            error!("{}", message);
        }
    }
    render_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Appearance, Message, Reason};
    use web3::types::Address;

    fn apps(n: u32) -> Vec<Appearance> {
        (1..=n)
            .map(|bn| Appearance {
                address: Address::repeat_byte(1),
                block_number: bn,
                transaction_index: 0,
                reason: Reason::Block,
                timestamp: None,
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_stream_frames_exactly() {
        let mut out: Vec<u8> = vec![];
        stream_many::<Message, _, _, _>(
            CancellationToken::new(),
            &mut out,
            |_models, _errors| async {},
            OutputOptions::default(),
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"data\": [\n    \n  ]\n}\n");
    }

    #[tokio::test]
    async fn json_stream_parses_with_expected_length() {
        let mut out: Vec<u8> = vec![];
        stream_many(
            CancellationToken::new(),
            &mut out,
            |models, _errors| async move {
                for app in apps(3) {
                    if models.send(app).await.is_err() {
                        return;
                    }
                }
            },
            OutputOptions::default(),
        )
        .await
        .unwrap();
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["data"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn api_envelope_carries_errors_in_arrival_order() {
        let mut out: Vec<u8> = vec![];
        let options = OutputOptions {
            format: "api".to_string(),
            meta: Some(Meta::default()),
            ..Default::default()
        };
        stream_many(
            CancellationToken::new(),
            &mut out,
            |models, errors| async move {
                let _ = errors.send(UnchainedError::NotFound("uncles".to_string()));
                let _ = errors.send(UnchainedError::TooManyRanges);
                for app in apps(1) {
                    let _ = models.send(app).await;
                }
            },
            options,
        )
        .await
        .unwrap();
        let parsed: Value = serde_json::from_slice(&out).unwrap();
        let errors = parsed["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "uncles not found");
        assert!(parsed["meta"].is_object());
    }

    #[tokio::test]
    async fn csv_has_key_row_then_rows() {
        let mut out: Vec<u8> = vec![];
        let options = OutputOptions {
            format: "csv".to_string(),
            ..Default::default()
        };
        stream_many(
            CancellationToken::new(),
            &mut out,
            |models, _errors| async move {
                for app in apps(2) {
                    let _ = models.send(app).await;
                }
            },
            options,
        )
        .await
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("address,blockNumber,"));
        assert!(lines[1].contains(",1,0,block"));
    }

    #[tokio::test]
    async fn single_character_format_is_a_delimiter() {
        let mut out: Vec<u8> = vec![];
        let options = OutputOptions {
            format: "|".to_string(),
            show_keys: false,
            ..Default::default()
        };
        stream_many(
            CancellationToken::new(),
            &mut out,
            |models, _errors| async move {
                let _ = models
                    .send(Message {
                        msg: "done".to_string(),
                    })
                    .await;
            },
            options,
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "done\n");
    }

    #[tokio::test]
    async fn template_format_renders_per_model() {
        let mut out: Vec<u8> = vec![];
        let options = OutputOptions {
            format: "block {{blockNumber}}".to_string(),
            ..Default::default()
        };
        stream_many(
            CancellationToken::new(),
            &mut out,
            |models, _errors| async move {
                for app in apps(2) {
                    let _ = models.send(app).await;
                }
            },
            options,
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "block 1\nblock 2\n");
    }

    #[tokio::test]
    async fn unknown_format_is_a_usage_error() {
        let mut out: Vec<u8> = vec![];
        let options = OutputOptions {
            format: "yaml".to_string(),
            ..Default::default()
        };
        let err = stream_many::<Message, _, _, _>(
            CancellationToken::new(),
            &mut out,
            |_models, _errors| async {},
            options,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UnchainedError::Usage(_)));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn cancellation_returns_immediately_with_parseable_prefix() {
        let mut out: Vec<u8> = vec![];
        let ctx = CancellationToken::new();
        ctx.cancel();
        let err = stream_many(
            ctx,
            &mut out,
            |models, _errors| async move {
                for app in apps(100) {
                    if models.send(app).await.is_err() {
                        return;
                    }
                }
            },
            OutputOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, UnchainedError::Cancelled));
        // Whatever was emitted, closing the frame yields valid JSON.
        let mut bytes = out.clone();
        bytes.extend_from_slice(b"\n  ]\n}\n");
        let parsed: std::result::Result<Value, _> = serde_json::from_slice(&bytes);
        assert!(parsed.is_ok());
    }
}
