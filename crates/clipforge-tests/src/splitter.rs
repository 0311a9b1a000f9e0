//! Integration tests for the segment splitter.
//!
//! The in-memory engine mimics the segment muxer: given `-segment_time S`
//! it writes `ceil(duration / S)` files named `output_<n>.mp4`.

use clipforge_core::{ClipforgeError, Result, SplitConfig};
use clipforge_media::{expected_segment_count, DirEntry, SegmentSplitter, TranscodeEngine};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    None,
    /// Write one segment, then fail
    ExecMidway,
    /// Fail reading the named segment
    Read(&'static str),
}

struct MemoryEngine {
    duration_secs: f64,
    failure: Failure,
    loads: usize,
    files: BTreeMap<String, Vec<u8>>,
    executed: Vec<Vec<String>>,
}

impl MemoryEngine {
    fn new(duration_secs: f64) -> Self {
        Self {
            duration_secs,
            failure: Failure::None,
            loads: 0,
            files: BTreeMap::new(),
            executed: Vec::new(),
        }
    }

    fn failing(duration_secs: f64, failure: Failure) -> Self {
        Self {
            failure,
            ..Self::new(duration_secs)
        }
    }
}

impl TranscodeEngine for MemoryEngine {
    fn load(&mut self) -> Result<()> {
        self.loads += 1;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loads > 0
    }

    fn write_file(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn exec(&mut self, args: &[String]) -> Result<()> {
        self.executed.push(args.to_vec());
        if !self.files.contains_key("input.mp4") {
            return Err(ClipforgeError::Transcode("input.mp4: No such file".into()));
        }

        let seconds: f64 = args
            .iter()
            .position(|a| a == "-segment_time")
            .and_then(|i| args.get(i + 1))
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ClipforgeError::Transcode("missing -segment_time".into()))?;
        let count = (self.duration_secs / seconds).ceil() as usize;

        for index in 0..count {
            self.files
                .insert(format!("output_{index}.mp4"), vec![index as u8; 8]);
            if self.failure == Failure::ExecMidway {
                return Err(ClipforgeError::Transcode("Conversion failed!".into()));
            }
        }
        Ok(())
    }

    fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>> {
        assert_eq!(path, "/");
        Ok(self.files.keys().map(DirEntry::file).collect())
    }

    fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        if let Failure::Read(target) = self.failure {
            if target == name {
                return Err(ClipforgeError::Io(std::io::Error::other("read failed")));
            }
        }
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| ClipforgeError::NotFound(name.to_string()))
    }

    fn delete_file(&mut self, name: &str) -> Result<()> {
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| ClipforgeError::NotFound(name.to_string()))
    }
}

fn split(engine: MemoryEngine, seconds: u32) -> (Result<Vec<String>>, MemoryEngine) {
    let mut splitter = SegmentSplitter::new(engine, SplitConfig::default());
    let result = splitter
        .split(b"fake video bytes", seconds)
        .map(|segments| segments.into_iter().map(|s| s.name).collect());
    (result, splitter.into_engine())
}

#[test]
fn produces_ceil_duration_over_seconds_segments_in_order() {
    let (result, engine) = split(MemoryEngine::new(23.0), 5);
    let names = result.unwrap();
    assert_eq!(names.len(), expected_segment_count(23.0, 5));
    assert_eq!(
        names,
        vec![
            "output_0.mp4",
            "output_1.mp4",
            "output_2.mp4",
            "output_3.mp4",
            "output_4.mp4"
        ]
    );
    assert!(engine.files.is_empty(), "left behind: {:?}", engine.files);
}

#[test]
fn segments_sort_numerically_past_nine() {
    let mut splitter = SegmentSplitter::new(MemoryEngine::new(100.0), SplitConfig::default());
    let segments = splitter.split(b"video", 9).unwrap();

    assert_eq!(segments.len(), 12);
    let indices: Vec<u32> = segments.iter().filter_map(|s| s.index()).collect();
    assert_eq!(indices, (0..12).collect::<Vec<_>>());
    // Contents follow the names they were read from
    assert!(segments
        .iter()
        .all(|s| s.bytes == vec![s.index().unwrap() as u8; 8]));
    assert!(splitter.engine().files.is_empty());
}

#[test]
fn passes_the_segment_command_to_the_engine() {
    let (result, engine) = split(MemoryEngine::new(10.0), 7);
    assert_eq!(result.unwrap().len(), 2);
    assert_eq!(engine.executed.len(), 1);

    let args = &engine.executed[0];
    let pair = |flag: &str| {
        let i = args.iter().position(|a| a == flag).unwrap();
        args[i + 1].clone()
    };
    assert_eq!(pair("-i"), "input.mp4");
    assert_eq!(pair("-segment_time"), "7");
    assert_eq!(pair("-g"), "30");
    assert_eq!(args.last().unwrap(), "output_%d.mp4");
}

#[test]
fn exec_failure_cleans_up_and_reports_one_transcode_error() {
    let (result, engine) = split(MemoryEngine::failing(30.0, Failure::ExecMidway), 5);
    match result {
        Err(ClipforgeError::Transcode(message)) => assert_eq!(message, "Conversion failed!"),
        other => panic!("expected transcode error, got {other:?}"),
    }
    assert!(engine.files.is_empty(), "left behind: {:?}", engine.files);
}

#[test]
fn read_failure_returns_no_partial_list() {
    let (result, engine) = split(MemoryEngine::failing(30.0, Failure::Read("output_2.mp4")), 5);
    assert!(matches!(result, Err(ClipforgeError::Transcode(_))));
    assert!(engine.files.is_empty());
}

#[test]
fn empty_listing_is_success_with_no_segments() {
    let (result, engine) = split(MemoryEngine::new(0.0), 5);
    assert_eq!(result.unwrap(), Vec::<String>::new());
    assert_eq!(engine.executed.len(), 1);
    assert!(engine.files.is_empty());
}

#[test]
fn zero_seconds_is_rejected_before_touching_the_engine() {
    let (result, engine) = split(MemoryEngine::new(10.0), 0);
    assert!(matches!(result, Err(ClipforgeError::InvalidParameter(_))));
    assert!(!engine.is_loaded());
    assert!(engine.executed.is_empty());
}

#[test]
fn repeated_splits_reuse_the_engine() {
    let mut splitter = SegmentSplitter::new(MemoryEngine::new(12.0), SplitConfig::default());
    assert_eq!(splitter.split(b"a", 4).unwrap().len(), 3);
    assert_eq!(splitter.split(b"b", 6).unwrap().len(), 2);
    assert!(splitter.engine().files.is_empty());
    assert_eq!(splitter.engine().executed.len(), 2);
}

#[test]
fn expected_count_matches_the_muxer_model() {
    for duration in [0.5, 1.0, 4.99, 5.0, 5.01, 59.0, 61.0, 3600.0] {
        for seconds in [1, 5, 7, 60] {
            let (result, _) = split(MemoryEngine::new(duration), seconds);
            assert_eq!(
                result.unwrap().len(),
                expected_segment_count(duration, seconds),
                "duration {duration}, seconds {seconds}"
            );
        }
    }
}
