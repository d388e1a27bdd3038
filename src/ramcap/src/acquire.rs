//! Acquisition driver
//!
//! Runs one acquisition from a validated configuration to a closed sink:
//! open the sink, arm the transforms, frame and transfer every range, flush,
//! close, then emit the digest artifact. All run state lives in a
//! `RunContext` owned by the call, so nothing outlives a run.

use crate::config::{AcquisitionConfig, ConfigError, ValidatedConfig, WireFormat};
use crate::format::{Framer, FramingError};
use crate::pipeline::{OutputPipeline, WriteError};
use crate::sink::{ByteSink, RetryPolicy, Sink, SinkError, WriteMode};
use crate::source::RangeSource;
use crate::transfer::{host_page_size, PageTransfer, RangeOutcome, RangeReport};
use crate::transform::{CompressStage, DeflateError, DigestOutcome, DigestStage, DEFLATE_CHUNK};
use serde::Serialize;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to open sink: {0}")]
    Sink(#[from] SinkError),

    #[error("Failed to start compression: {0}")]
    Compressor(#[source] DeflateError),

    #[error("Run aborted: {0}")]
    Framing(#[from] FramingError),

    #[error("Failed to flush output: {0}")]
    Flush(#[source] WriteError),

    #[error("Failed to close sink: {0}")]
    Close(#[source] io::Error),
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionReport {
    pub destination: String,
    pub format: WireFormat,
    pub write_mode: Option<WriteMode>,
    pub compressed: bool,
    pub ranges: Vec<RangeReport>,
    /// Bytes handed to the pipeline, before compression
    pub logical_bytes: u64,
    /// Bytes accepted by the sink
    pub wire_bytes: u64,
    /// Zero bytes emitted for gaps and failed pages
    pub padding_bytes: u64,
    /// Bytes hashed into the digest but replaced by zeros in the image
    ///
    /// When non-zero the digest describes the memory as read, not the
    /// image as written.
    pub digest_unwritten_bytes: u64,
    pub digest: DigestOutcome,
}

impl AcquisitionReport {
    pub fn pages_failed(&self) -> u64 {
        self.ranges.iter().map(|r| r.failed_pages).sum()
    }

    pub fn ranges_timed_out(&self) -> usize {
        self.ranges
            .iter()
            .filter(|r| matches!(r.outcome, RangeOutcome::TimedOut { .. }))
            .count()
    }

    /// Whether the digest is the hash of the uncompressed image
    pub fn digest_matches_image(&self) -> bool {
        self.digest_unwritten_bytes == 0
    }

    /// Every range was copied without compensation
    pub fn is_complete(&self) -> bool {
        self.ranges
            .iter()
            .all(|r| r.outcome == RangeOutcome::Complete)
    }
}

/// State owned by a single run
struct RunContext<K: ByteSink> {
    pipeline: OutputPipeline<K>,
    framer: Framer,
    transfer: PageTransfer,
    ranges: Vec<RangeReport>,
}

impl<K: ByteSink> RunContext<K> {
    /// Close the sink after a fatal error, keeping what was already written
    fn abort(self) {
        let (mut sink, _) = self.pipeline.into_parts();
        if let Err(err) = sink.close() {
            tracing::warn!("Error closing {} after abort: {}", sink.describe(), err);
        }
    }
}

/// One configured acquisition
pub struct Acquisition {
    config: ValidatedConfig,
    page_size: usize,
}

impl Acquisition {
    pub fn new(config: ValidatedConfig) -> Self {
        Self {
            config,
            page_size: host_page_size(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Open the configured sink and acquire every range of `source`
    pub fn run<S: RangeSource + ?Sized>(&self, source: &S) -> Result<AcquisitionReport, AcquireError> {
        tracing::debug!(
            "Parameters: PATH={}, FORMAT={}, DIO={}, DIGEST={}, COMPRESS={}, TIMEOUT={:?}",
            self.config.destination,
            self.config.wire_format,
            self.config.direct_io,
            self.config.digest.as_deref().unwrap_or("none"),
            self.config.compress,
            self.config.per_page_timeout
        );

        let sink = Sink::open(&self.config)?;
        self.run_with_sink(source, sink)
    }

    /// Acquire every range of `source` into an already opened sink
    pub fn run_with_sink<S, K>(
        &self,
        source: &S,
        mut sink: K,
    ) -> Result<AcquisitionReport, AcquireError>
    where
        S: RangeSource + ?Sized,
        K: ByteSink,
    {
        let config = &self.config;
        let destination = sink.describe();
        let write_mode = sink.write_mode();

        let digest = DigestStage::arm(config.digest.as_deref());

        if config.compress {
            tracing::debug!("Initializing Deflate Transformation.");
        }
        let compress = match CompressStage::begin(config.compress, DEFLATE_CHUNK) {
            Ok(compress) => compress,
            Err(err) => {
                if let Err(close_err) = sink.close() {
                    tracing::warn!("Error closing {}: {}", destination, close_err);
                }
                return Err(AcquireError::Compressor(err));
            }
        };

        let mut ctx = RunContext {
            pipeline: OutputPipeline::new(sink, digest, compress),
            framer: Framer::new(config.wire_format, self.page_size, config.pad_leading_gap),
            transfer: PageTransfer::new(self.page_size, config.per_page_timeout),
            ranges: Vec::with_capacity(source.ranges().len()),
        };

        tracing::info!(
            "Acquiring {} ranges ({} bytes) to {} as {}",
            source.ranges().len(),
            source.total_len(),
            destination,
            config.wire_format
        );

        for range in source.ranges() {
            if let Err(err) = ctx.framer.begin_range(&mut ctx.pipeline, range) {
                tracing::warn!("{}", err);
                ctx.abort();
                return Err(err.into());
            }

            let report = ctx
                .transfer
                .transfer(source, range, &mut ctx.framer, &mut ctx.pipeline);
            ctx.framer.end_range(range);
            ctx.ranges.push(report);
        }

        if let Err(err) = ctx.pipeline.flush() {
            ctx.abort();
            return Err(AcquireError::Flush(err));
        }

        let logical_bytes = ctx.pipeline.logical_bytes();
        let wire_bytes = ctx.pipeline.wire_bytes();
        let compressed = ctx.pipeline.is_compressed();
        let padding_bytes = ctx.framer.padded_bytes();
        let digest_unwritten_bytes = ctx.pipeline.unwritten_bytes();
        let ranges = ctx.ranges;

        let (mut sink, digest) = ctx.pipeline.into_parts();
        sink.close().map_err(AcquireError::Close)?;

        let digest = write_digest(&mut sink, digest);

        let report = AcquisitionReport {
            destination,
            format: config.wire_format,
            write_mode,
            compressed,
            ranges,
            logical_bytes,
            wire_bytes,
            padding_bytes,
            digest_unwritten_bytes,
            digest,
        };

        if !report.digest_matches_image() && !matches!(report.digest, DigestOutcome::Disabled) {
            tracing::warn!(
                "Digest covers {} bytes that were zero-filled in the image",
                report.digest_unwritten_bytes
            );
        }

        tracing::info!(
            "Acquisition complete: {} ranges, {} bytes ({} on the wire, {} padding, {} failed pages)",
            report.ranges.len(),
            report.logical_bytes,
            report.wire_bytes,
            report.padding_bytes,
            report.pages_failed()
        );

        Ok(report)
    }
}

/// Validate `config`, open its sink and acquire every range of `source`
pub fn run<S: RangeSource + ?Sized>(
    config: &AcquisitionConfig,
    source: &S,
) -> Result<AcquisitionReport, AcquireError> {
    Acquisition::new(config.validate()?).run(source)
}

/// Finalize the digest and write it to the sink's side channel
///
/// Failures are reported in the outcome; the acquisition itself stands.
fn write_digest<K: ByteSink>(sink: &mut K, stage: DigestStage) -> DigestOutcome {
    let (name, engine) = match stage {
        DigestStage::Disabled => return DigestOutcome::Disabled,
        DigestStage::Failed { name, reason } => {
            return DigestOutcome::Failed {
                algorithm: name,
                reason,
            }
        }
        DigestStage::Armed { name, engine } => (name, engine),
    };

    let hex = engine.finalize_hex();
    let destination = sink.digest_destination(&name);

    let written = sink.digest_channel(&name).and_then(|mut channel| {
        RetryPolicy::INTERRUPTIONS.write_all(&mut channel, hex.as_bytes())?;
        channel.flush()
    });

    match written {
        Ok(()) => {
            tracing::debug!("Wrote {} digest to {}", name, destination);
            DigestOutcome::Written {
                algorithm: name,
                hex,
                destination,
            }
        }
        Err(err) => {
            tracing::warn!("Error writing {} digest to {}: {}", name, destination, err);
            DigestOutcome::Failed {
                algorithm: name,
                reason: err.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{scan_structured, RangeHeader, HEADER_LEN};
    use crate::sink::NetworkSink;
    use crate::source::MockRangeSource;
    use crate::transform::{DigestAlgorithm, DigestEngine};
    use flate2::read::ZlibDecoder;
    use std::fs::{self, File};
    use std::io::Read;
    use std::net::{TcpListener, TcpStream};
    use std::path::Path;
    use std::thread;

    const PAGE: usize = 0x1000;

    /// In-memory sink with an optional byte budget
    #[derive(Default)]
    struct MemorySink {
        data: Vec<u8>,
        digest: Vec<u8>,
        limit: Option<usize>,
        closed: bool,
        refuse_digest: bool,
        /// Fail this write call (1-based) with a broken pipe
        break_on: Option<usize>,
        calls: usize,
    }

    impl Write for MemorySink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.closed {
                return Err(io::Error::from(io::ErrorKind::NotConnected));
            }
            self.calls += 1;
            if self.break_on == Some(self.calls) {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            let room = self
                .limit
                .map_or(buf.len(), |limit| limit.saturating_sub(self.data.len()));
            let n = buf.len().min(room);
            if n == 0 {
                return Err(io::Error::from(io::ErrorKind::WriteZero));
            }
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ByteSink for MemorySink {
        fn close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }

        fn digest_channel(&mut self, _suffix: &str) -> io::Result<Box<dyn Write + '_>> {
            if self.refuse_digest {
                return Err(io::Error::other("side channel unavailable"));
            }
            Ok(Box::new(&mut self.digest))
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    fn two_ranges() -> MockRangeSource {
        MockRangeSource::from_pairs(&[(0x1000, 0x1fff), (0x3000, 0x3fff)])
    }

    fn disk_config(path: &Path, format: WireFormat) -> ValidatedConfig {
        ValidatedConfig::disk(path, format)
    }

    fn acquire(config: ValidatedConfig, source: &MockRangeSource) -> AcquisitionReport {
        Acquisition::new(config)
            .with_page_size(PAGE)
            .run(source)
            .unwrap()
    }

    fn sha256_hex(data: &[u8]) -> String {
        let mut engine = DigestEngine::init(DigestAlgorithm::Sha256);
        engine.update(data);
        engine.finalize_hex()
    }

    #[test]
    fn test_padded_scenario_without_leading_gap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.padded");

        let report = acquire(disk_config(&path, WireFormat::Padded), &two_ranges());

        // The gap below the first range is not represented
        let image = fs::read(&path).unwrap();
        assert_eq!(image.len(), 0x3000);
        assert_eq!(&image[..0x1000], &MockRangeSource::bytes(0x1000, PAGE)[..]);
        assert!(image[0x1000..0x2000].iter().all(|&b| b == 0));
        assert_eq!(&image[0x2000..], &MockRangeSource::bytes(0x3000, PAGE)[..]);

        assert_eq!(report.logical_bytes, 0x3000);
        assert_eq!(report.padding_bytes, 0x1000);
        assert!(report.is_complete());
        assert_eq!(report.write_mode, Some(WriteMode::Buffered));
        assert_eq!(report.digest, DigestOutcome::Disabled);
    }

    #[test]
    fn test_padded_scenario_with_leading_gap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.padded");
        let config = ValidatedConfig {
            pad_leading_gap: true,
            ..disk_config(&path, WireFormat::Padded)
        };

        acquire(config, &two_ranges());

        // Output offset equals physical address
        let image = fs::read(&path).unwrap();
        assert_eq!(image.len(), 0x4000);
        assert!(image[..0x1000].iter().all(|&b| b == 0));
        assert_eq!(&image[0x1000..0x2000], &MockRangeSource::bytes(0x1000, PAGE)[..]);
        assert!(image[0x2000..0x3000].iter().all(|&b| b == 0));
        assert_eq!(&image[0x3000..], &MockRangeSource::bytes(0x3000, PAGE)[..]);
    }

    #[test]
    fn test_structured_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.lime");

        acquire(disk_config(&path, WireFormat::Lime), &two_ranges());

        let image = fs::read(&path).unwrap();
        assert_eq!(image.len(), 2 * HEADER_LEN + 2 * PAGE);

        let first = RangeHeader::parse(image[..HEADER_LEN].try_into().unwrap(), 0).unwrap();
        assert_eq!((first.start, first.end, first.version), (0x1000, 0x1fff, 1));
        assert_eq!(
            &image[HEADER_LEN..HEADER_LEN + PAGE],
            &MockRangeSource::bytes(0x1000, PAGE)[..]
        );

        let second_at = HEADER_LEN + PAGE;
        let second = RangeHeader::parse(
            image[second_at..second_at + HEADER_LEN].try_into().unwrap(),
            second_at as u64,
        )
        .unwrap();
        assert_eq!((second.start, second.end), (0x3000, 0x3fff));

        let scanned = scan_structured(&mut File::open(&path).unwrap()).unwrap();
        let ranges: Vec<_> = scanned.iter().map(|s| s.range).collect();
        assert_eq!(ranges, two_ranges().ranges);
    }

    #[test]
    fn test_raw_runs_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.raw");
        let second = dir.path().join("second.raw");
        let source = two_ranges();

        acquire(disk_config(&first, WireFormat::Raw), &source);
        acquire(disk_config(&second, WireFormat::Raw), &source);

        let first = fs::read(first).unwrap();
        assert_eq!(first, fs::read(second).unwrap());

        let mut expected = MockRangeSource::bytes(0x1000, PAGE);
        expected.extend(MockRangeSource::bytes(0x3000, PAGE));
        assert_eq!(first, expected);
    }

    #[test]
    fn test_digest_side_file_matches_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.lime");
        let config = ValidatedConfig {
            digest: Some("sha256".to_string()),
            ..disk_config(&path, WireFormat::Lime)
        };

        let report = acquire(config, &two_ranges());

        let image = fs::read(&path).unwrap();
        let side = dir.path().join("mem.lime.sha256");
        let written = fs::read_to_string(&side).unwrap();
        assert_eq!(written, sha256_hex(&image));
        assert!(!written.ends_with('\n'));

        match report.digest {
            DigestOutcome::Written {
                algorithm,
                hex,
                destination,
            } => {
                assert_eq!(algorithm, "sha256");
                assert_eq!(hex, written);
                assert_eq!(destination, side.display().to_string());
            }
            other => panic!("unexpected digest outcome {other:?}"),
        }
    }

    #[test]
    fn test_digest_is_independent_of_compression() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.padded");
        let packed = dir.path().join("packed.padded");
        let source = two_ranges();

        let base = |path: &Path| ValidatedConfig {
            digest: Some("sha512".to_string()),
            ..disk_config(path, WireFormat::Padded)
        };
        acquire(base(&plain), &source);
        let report = acquire(
            ValidatedConfig {
                compress: true,
                ..base(&packed)
            },
            &source,
        );
        assert!(report.compressed);
        assert_eq!(report.logical_bytes, 0x3000);
        assert_eq!(report.wire_bytes, fs::metadata(&packed).unwrap().len());

        let plain_digest = fs::read_to_string(dir.path().join("plain.padded.sha512")).unwrap();
        let packed_digest = fs::read_to_string(dir.path().join("packed.padded.sha512")).unwrap();
        assert_eq!(plain_digest, packed_digest);

        let mut inflated = Vec::new();
        ZlibDecoder::new(File::open(&packed).unwrap())
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, fs::read(&plain).unwrap());
    }

    #[test]
    fn test_unknown_digest_does_not_fail_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.raw");
        let config = ValidatedConfig {
            digest: Some("md5".to_string()),
            ..disk_config(&path, WireFormat::Raw)
        };

        let report = acquire(config, &two_ranges());

        assert!(matches!(report.digest, DigestOutcome::Failed { .. }));
        assert_eq!(fs::metadata(&path).unwrap().len(), 0x2000);
        assert!(!dir.path().join("mem.raw.md5").exists());
    }

    #[test]
    fn test_digest_channel_failure_is_reported() {
        let mut sink = MemorySink {
            refuse_digest: true,
            ..Default::default()
        };
        let config = ValidatedConfig {
            digest: Some("sha256".to_string()),
            ..ValidatedConfig::disk("unused", WireFormat::Raw)
        };

        let report = Acquisition::new(config)
            .with_page_size(PAGE)
            .run_with_sink(&two_ranges(), &mut sink)
            .unwrap();

        assert!(sink.closed);
        assert_eq!(sink.data.len(), 0x2000);
        assert!(matches!(
            report.digest,
            DigestOutcome::Failed { ref reason, .. } if reason.contains("unavailable")
        ));
    }

    #[test]
    fn test_header_failure_aborts_run() {
        // Room for the first header, the first range and part of the second header
        let mut sink = MemorySink {
            limit: Some(HEADER_LEN + PAGE + 8),
            ..Default::default()
        };
        let config = ValidatedConfig {
            digest: Some("sha256".to_string()),
            ..ValidatedConfig::disk("unused", WireFormat::Lime)
        };

        let err = Acquisition::new(config)
            .with_page_size(PAGE)
            .run_with_sink(&two_ranges(), &mut sink)
            .unwrap_err();

        assert!(matches!(
            err,
            AcquireError::Framing(FramingError::Header { .. })
        ));
        assert!(sink.closed);
        assert!(sink.digest.is_empty());
        // Already written output is left in place
        assert_eq!(sink.data.len(), HEADER_LEN + PAGE + 8);
    }

    #[test]
    fn test_failed_page_is_counted_and_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.padded");
        let source = MockRangeSource::from_pairs(&[(0, 0x2fff)]).fail_at(0x1000);

        let report = acquire(disk_config(&path, WireFormat::Padded), &source);

        assert_eq!(report.pages_failed(), 1);
        assert_eq!(report.padding_bytes, 0x1000);
        assert!(!report.is_complete());
        let image = fs::read(&path).unwrap();
        assert_eq!(image.len(), 0x3000);
        assert!(image[0x1000..0x2000].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_compressed_write_failure_keeps_padded_layout() {
        let mut sink = MemorySink {
            break_on: Some(2),
            ..Default::default()
        };
        let source = MockRangeSource::from_pairs(&[(0, 0xff_ffff), (0x200_0000, 0x200_0fff)]);
        let config = ValidatedConfig {
            compress: true,
            digest: Some("sha256".to_string()),
            ..ValidatedConfig::disk("unused", WireFormat::Padded)
        };

        let report = Acquisition::new(config)
            .with_page_size(PAGE)
            .run_with_sink(&source, &mut sink)
            .unwrap();

        assert!(matches!(report.ranges[0].outcome, RangeOutcome::Failed { .. }));
        assert_eq!(report.ranges[1].outcome, RangeOutcome::Complete);

        let mut inflated = Vec::new();
        ZlibDecoder::new(&sink.data[..])
            .read_to_end(&mut inflated)
            .unwrap();

        // Output offset still equals physical address after the failure
        assert_eq!(inflated.len(), 0x200_0000 + PAGE);
        assert_eq!(inflated.len() as u64, report.logical_bytes);
        let data = report.ranges[0].data_bytes as usize;
        assert_eq!(&inflated[..data], &MockRangeSource::bytes(0, data)[..]);
        assert!(inflated[data..0x200_0000].iter().all(|&b| b == 0));
        assert_eq!(
            &inflated[0x200_0000..],
            &MockRangeSource::bytes(0x200_0000, PAGE)[..]
        );

        // The failed page was hashed in full but only partly written
        assert!(report.digest_unwritten_bytes > 0);
        assert!(!report.digest_matches_image());
        let hex = String::from_utf8(sink.digest.clone()).unwrap();
        assert_ne!(hex, sha256_hex(&inflated));
    }

    #[test]
    fn test_digest_matches_image_without_failures() {
        let mut sink = MemorySink::default();
        let config = ValidatedConfig {
            digest: Some("sha256".to_string()),
            ..ValidatedConfig::disk("unused", WireFormat::Padded)
        };

        let report = Acquisition::new(config)
            .with_page_size(PAGE)
            .run_with_sink(&two_ranges(), &mut sink)
            .unwrap();

        assert!(report.digest_matches_image());
        assert_eq!(
            String::from_utf8(sink.digest.clone()).unwrap(),
            sha256_hex(&sink.data)
        );
    }

    #[test]
    fn test_timeout_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mem.lime");
        let source = MockRangeSource::from_pairs(&[(0, 0x3fff), (0x8000, 0x8fff)])
            .slow_at(0, std::time::Duration::from_millis(150));
        let config = ValidatedConfig {
            per_page_timeout: Some(std::time::Duration::from_millis(25)),
            ..disk_config(&path, WireFormat::Lime)
        };

        let report = acquire(config, &source);

        assert_eq!(report.ranges_timed_out(), 1);
        assert_eq!(report.ranges[1].outcome, RangeOutcome::Complete);
        // Each range keeps its full length
        let image = fs::read(&path).unwrap();
        assert_eq!(image.len(), 2 * HEADER_LEN + 0x4000 + 0x1000);
        assert!(image[HEADER_LEN + PAGE..HEADER_LEN + 0x4000]
            .iter()
            .all(|&b| b == 0));
    }

    #[test]
    fn test_invalid_config_touches_nothing() {
        let config = AcquisitionConfig {
            format: Some("lime".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            run(&config, &two_ranges()),
            Err(AcquireError::Config(ConfigError::MissingPath))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.raw");
        let config = AcquisitionConfig {
            path: Some(path.display().to_string()),
            format: Some("elf".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            run(&config, &two_ranges()),
            Err(AcquireError::Config(ConfigError::UnknownFormat(_)))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_unopenable_destination_is_sink_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("mem.raw");
        let config = disk_config(&path, WireFormat::Raw);

        let err = Acquisition::new(config).run(&two_ranges()).unwrap_err();
        assert!(matches!(err, AcquireError::Sink(SinkError::Open { .. })));
    }

    #[test]
    fn test_network_run_streams_payload_then_digest() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let client = thread::spawn(move || {
            let mut stream = TcpStream::connect(addr).unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).unwrap();
            received
        });

        let sink = NetworkSink::accept_from(listener).unwrap();
        let config = ValidatedConfig {
            destination: crate::config::Destination::Tcp(addr.port()),
            digest: Some("sha256".to_string()),
            ..ValidatedConfig::disk("unused", WireFormat::Raw)
        };
        let report = Acquisition::new(config)
            .with_page_size(PAGE)
            .run_with_sink(&two_ranges(), sink)
            .unwrap();
        assert_eq!(report.write_mode, None);

        let received = client.join().unwrap();
        let (payload, digest) = received.split_at(0x2000);
        assert_eq!(std::str::from_utf8(digest).unwrap(), sha256_hex(payload));
        assert_eq!(&payload[..PAGE], &MockRangeSource::bytes(0x1000, PAGE)[..]);
    }

    #[test]
    fn test_report_serializes() {
        let mut sink = MemorySink::default();
        let report = Acquisition::new(ValidatedConfig::disk("unused", WireFormat::Padded))
            .with_page_size(PAGE)
            .run_with_sink(&two_ranges(), &mut sink)
            .unwrap();

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["format"], "padded");
        assert_eq!(value["ranges"][0]["outcome"]["status"], "complete");
        assert_eq!(value["digest"]["status"], "disabled");
    }
}
