//! Replay determinism helpers.
//!
//! A session is recorded frame by frame, saved as a `TimeMachine` JSON file,
//! then re-simulated from its inputs; every frame's state digest must match.
//! Digests can also be pinned in golden files.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};

use crate::{GameLogic, HeadlessRunner, TimeMachine};

/// Reduces a session name to `[A-Za-z0-9_-]` so it can name a file.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

/// SHA-256 of the state's JSON encoding, hex encoded.
pub fn state_sha256_hex<S: Serialize>(state: &S) -> String {
    let bytes = serde_json::to_vec(state).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

pub fn history_digests<S: Serialize>(history: &[S]) -> Vec<String> {
    history.iter().map(state_sha256_hex).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DigestGolden {
    pub version: u32,
    pub name: String,
    pub hash_alg: String,
    /// One digest per recorded state.
    pub digests: Vec<String>,
}

impl DigestGolden {
    pub fn new(name: impl Into<String>, digests: Vec<String>) -> Self {
        Self {
            version: 1,
            name: name.into(),
            hash_alg: "sha256".to_string(),
            digests,
        }
    }
}

pub fn load_golden_json(path: impl AsRef<Path>) -> io::Result<DigestGolden> {
    let path = path.as_ref();
    serde_json::from_slice(&fs::read(path)?)
        .map_err(|err| invalid_data(format!("digest golden {} is not valid json: {err}", path.display())))
}

pub fn save_golden_json(path: impl AsRef<Path>, golden: &DigestGolden) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, serde_json::to_vec_pretty(golden).map_err(io::Error::from)?)
}

/// Writes the golden when missing or when `update` is set, otherwise
/// compares digest by digest.
pub fn assert_or_update_golden_json(
    path: impl AsRef<Path>,
    golden: &DigestGolden,
    update: bool,
) -> io::Result<()> {
    let path = path.as_ref();
    let exists = path.exists();
    if update || !exists {
        save_golden_json(path, golden)?;
        log::info!(
            "{} digest golden {}",
            if exists { "rewrote" } else { "created" },
            path.display()
        );
        return Ok(());
    }

    let expected = load_golden_json(path)?;
    if expected.hash_alg != golden.hash_alg || expected.digests.len() != golden.digests.len() {
        return Err(invalid_data(format!(
            "golden {} pins {} {} digest(s) but the session produced {} {}",
            path.display(),
            expected.digests.len(),
            expected.hash_alg,
            golden.digests.len(),
            golden.hash_alg
        )));
    }
    match first_mismatch(&expected.digests, &golden.digests) {
        Some(frame) => Err(invalid_data(format!(
            "golden {} diverges at frame {frame}: pinned {} but got {}",
            path.display(),
            expected.digests[frame],
            golden.digests[frame]
        ))),
        None => Ok(()),
    }
}

fn first_mismatch(a: &[String], b: &[String]) -> Option<usize> {
    a.iter().zip(b).position(|(x, y)| x != y)
}

#[derive(Debug, Clone)]
pub struct ReplayArtifacts {
    pub timeline_json: PathBuf,
    pub digests: Vec<String>,
}

/// Runs `inputs` live, saves the timeline, reloads it and re-simulates the
/// same inputs from the initial state. Fails on the first frame whose
/// digest differs between the saved and the re-simulated run.
pub fn record_then_replay_and_compare<G>(
    name: &str,
    out_dir: impl AsRef<Path>,
    game: G,
    inputs: Vec<G::Input>,
) -> io::Result<ReplayArtifacts>
where
    G: GameLogic + Clone,
    G::Input: Clone,
    G::State: Serialize + DeserializeOwned,
{
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;
    let timeline_json = out_dir.join(format!("{}.json", sanitize_filename(name)));

    let mut live = HeadlessRunner::new(game.clone());
    live.run(inputs.iter().cloned());
    live.timemachine().save_json_file(&timeline_json)?;

    let saved = TimeMachine::<G::State>::load_json_file(&timeline_json)?;
    let saved_digests = history_digests(saved.history());

    let mut replay = HeadlessRunner::new(game);
    replay.run(inputs);
    let replay_digests = history_digests(replay.history());

    if saved_digests.len() != replay_digests.len() {
        return Err(invalid_data(format!(
            "saved session has {} frame(s), replay produced {}",
            saved_digests.len(),
            replay_digests.len()
        )));
    }
    if let Some(frame) = first_mismatch(&saved_digests, &replay_digests) {
        return Err(invalid_data(format!("replay diverged at frame {frame}")));
    }
    log::debug!("replay of {name} matched over {} frame(s)", saved_digests.len());

    Ok(ReplayArtifacts {
        timeline_json,
        digests: saved_digests,
    })
}
