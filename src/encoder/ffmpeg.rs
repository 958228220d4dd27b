//! Ffmpeg-backed encoder
//!
//! Spawns the ffmpeg binary once per file. Child PIDs are registered while
//! they run so `abort_in_flight` can terminate them immediately; a killed or
//! failed encode deletes its partial output.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;

use super::{EncodeRequest, Encoder};

/// Encoder that shells out to ffmpeg
pub struct FfmpegEncoder {
    ffmpeg_path: PathBuf,
    /// Target bitrate in kbps
    bitrate: u32,
    /// PIDs of currently running ffmpeg processes (for instant termination)
    running_pids: Mutex<HashSet<u32>>,
}

impl FfmpegEncoder {
    pub fn new(ffmpeg_path: PathBuf, bitrate: u32) -> Self {
        Self {
            ffmpeg_path,
            bitrate,
            running_pids: Mutex::new(HashSet::new()),
        }
    }

    /// Build an encoder from the discovered ffmpeg binary
    pub fn discover(bitrate: u32) -> Result<Self, String> {
        let path = super::verify_ffmpeg()?;
        Ok(Self::new(path, bitrate))
    }

    fn register_pid(&self, pid: u32) {
        self.running_pids.lock().unwrap().insert(pid);
    }

    fn unregister_pid(&self, pid: u32) {
        self.running_pids.lock().unwrap().remove(&pid);
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(&self, request: &EncodeRequest) -> Result<(), String> {
        if let Some(parent) = request.output.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create output dir: {}", e))?;
            }
        }

        let bitrate_str = format!("{}k", self.bitrate);

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-y")
            .arg("-i")
            .arg(&request.source)
            .arg("-vn")
            .arg("-codec:a")
            .arg("libmp3lame")
            .arg("-b:a")
            .arg(&bitrate_str)
            .arg("-map_metadata")
            .arg("0")
            .arg("-id3v2_version")
            .arg("3")
            .arg(&request.output);

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| format!("Failed to spawn ffmpeg: {}", e))?;
        let pid = child.id();

        self.register_pid(pid);
        let status = child
            .wait()
            .map_err(|e| format!("Failed to wait for ffmpeg: {}", e));
        self.unregister_pid(pid);
        let status = status?;

        if status.success() {
            Ok(())
        } else {
            // Killed or failed - delete partial output to avoid corruption
            let _ = std::fs::remove_file(&request.output);
            Err(format!("ffmpeg failed with status: {}", status))
        }
    }

    /// Kill all running ffmpeg processes
    fn abort_in_flight(&self) {
        let pids: Vec<u32> = self.running_pids.lock().unwrap().iter().copied().collect();
        for pid in pids {
            #[cfg(unix)]
            unsafe {
                // SIGKILL for immediate termination
                libc::kill(pid as i32, libc::SIGKILL);
            }
            #[cfg(not(unix))]
            {
                // On non-Unix we can't easily kill by PID; the process will
                // finish and its result is discarded by the backend.
                let _ = pid;
            }
        }
        self.running_pids.lock().unwrap().clear();
    }
}
