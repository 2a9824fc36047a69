//! Scripted collaborators: downloader, tagger, volume source, disk selector

use async_trait::async_trait;
use mpme::discovery::VolumeSource;
use mpme::error::{ExportError, FetchError, TagError};
use mpme::fetch::{Downloader, FetchRequest};
use mpme::{DiskSelector, Tagger};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Fails each search term a scripted number of times, then writes the file
#[derive(Default)]
pub struct ScriptedDownloader {
    failures: HashMap<String, u32>,
    default_failures: u32,
    calls: Mutex<HashMap<String, u32>>,
    updates: AtomicU32,
}

impl ScriptedDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every search term fails this many times before succeeding
    pub fn failing_each(failures: u32) -> Self {
        Self {
            default_failures: failures,
            ..Self::default()
        }
    }

    /// Override the failure count for one search term
    pub fn failing(mut self, search_term: &str, failures: u32) -> Self {
        self.failures.insert(search_term.to_string(), failures);
        self
    }

    /// Download calls made for a search term
    pub fn calls_for(&self, search_term: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(search_term)
            .copied()
            .unwrap_or(0)
    }

    pub fn updates(&self) -> u32 {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Downloader for ScriptedDownloader {
    async fn download(&self, request: &FetchRequest) -> Result<(), FetchError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(request.search_term.clone()).or_insert(0);
            *count += 1;
            *count
        };
        let failures = self
            .failures
            .get(&request.search_term)
            .copied()
            .unwrap_or(self.default_failures);
        if call <= failures {
            return Err(FetchError::ToolFailed {
                tool: "scripted".into(),
                status: "exit status: 1".into(),
                stderr: format!("attempt {call} failed"),
            });
        }

        tokio::fs::write(&request.expected_path, b"ID3 fake audio")
            .await
            .map_err(|e| FetchError::Spawn {
                tool: "scripted".into(),
                reason: e.to_string(),
            })
    }

    async fn update(&self) -> Result<(), FetchError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Err(FetchError::NotFound("offline".into()))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Records every tag request without touching the file
#[derive(Default)]
pub struct RecordingTagger {
    pub tagged: Mutex<Vec<(PathBuf, String, String)>>,
}

#[async_trait]
impl Tagger for RecordingTagger {
    async fn tag(&self, path: &Path, artist: &str, title: &str) -> Result<(), TagError> {
        self.tagged
            .lock()
            .unwrap()
            .push((path.to_path_buf(), artist.to_string(), title.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Returns each scripted volume set once, then repeats the last
pub struct ScriptedVolumes {
    polls: Vec<BTreeSet<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedVolumes {
    pub fn new(polls: &[&[&str]]) -> Self {
        Self {
            polls: polls
                .iter()
                .map(|names| names.iter().map(|n| n.to_string()).collect())
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl VolumeSource for ScriptedVolumes {
    fn volumes(&self) -> Result<BTreeSet<String>, ExportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.polls[call.min(self.polls.len() - 1)].clone())
    }
}

/// Answers prompts from a script, in order
pub struct ScriptedSelector {
    answers: Mutex<Vec<String>>,
    pub prompts: AtomicUsize,
}

impl ScriptedSelector {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().rev().map(|a| a.to_string()).collect()),
            prompts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DiskSelector for ScriptedSelector {
    async fn prompt(&self, _candidates: &[String]) -> Result<String, ExportError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ExportError::Prompt("out of answers".into()))
    }
}
