//! Container templates and ISO images

use anyhow::{Context, Result, bail};
use declarative::{Action, ApplyContext, ApplyResult, ResourceState};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::{TEMPLATE_INDEX_KEY, storage_key, table_lists, volume_key};
use crate::schema::TemplateRequest;

const USER_AGENT: &str = concat!("pvesetup/", env!("CARGO_PKG_VERSION"));

/// Refresh of the appliance index so `pveam download` sees current names
#[derive(Debug, Clone, Default)]
pub struct TemplateIndex;

impl Action for TemplateIndex {
    fn id(&self) -> String {
        "pveam-update".to_string()
    }

    fn description(&self) -> String {
        "Refresh the container template index".to_string()
    }

    fn action_type(&self) -> &'static str {
        "template_index"
    }

    fn provides(&self) -> Vec<String> {
        vec![TEMPLATE_INDEX_KEY.to_string()]
    }

    fn current_state(&self, _ctx: &ApplyContext) -> Result<ResourceState> {
        Ok(ResourceState::Unknown)
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        ctx.runner.run_checked("pveam", &["update"])?;
        Ok(ApplyResult::Modified)
    }

    fn verify(&self, _ctx: &ApplyContext) -> Result<bool> {
        Ok(true)
    }
}

/// A container template fetched with `pveam download`
#[derive(Debug, Clone)]
pub struct ContainerTemplate {
    pub storage: String,
    pub name: String,
    pub volid: String,
}

impl ContainerTemplate {
    pub fn new(request: &TemplateRequest) -> Self {
        Self {
            storage: request.storage.clone(),
            name: request.file_name().to_string(),
            volid: request.volid(),
        }
    }
}

impl Action for ContainerTemplate {
    fn id(&self) -> String {
        self.volid.clone()
    }

    fn description(&self) -> String {
        format!("Download container template {} to {}", self.name, self.storage)
    }

    fn action_type(&self) -> &'static str {
        "container_template"
    }

    fn details(&self) -> Option<String> {
        Some(format!("pveam download {} {}", self.storage, self.name))
    }

    fn provides(&self) -> Vec<String> {
        vec![volume_key(&self.volid)]
    }

    fn requires(&self) -> Vec<String> {
        vec![storage_key(&self.storage), TEMPLATE_INDEX_KEY.to_string()]
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let output = ctx.runner.run_capture("pveam", &["list", &self.storage])?;
        Ok(if table_lists(&output, &self.volid) {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        ctx.runner
            .run_checked("pveam", &["download", &self.storage, &self.name])?;
        Ok(ApplyResult::Created)
    }
}

/// An installer ISO downloaded over HTTP(S) into an ISO storage
#[derive(Debug, Clone)]
pub struct IsoImage {
    pub storage: String,
    pub url: String,
    pub volid: String,
    pub sha256: Option<String>,
}

impl IsoImage {
    pub fn new(request: &TemplateRequest) -> Self {
        Self {
            storage: request.storage.clone(),
            url: request.source.clone(),
            volid: request.volid(),
            sha256: request.sha256.clone(),
        }
    }

    /// Path the storage keeps this volume at
    fn destination(&self, ctx: &ApplyContext) -> Result<PathBuf> {
        let path = ctx.runner.run_capture("pvesm", &["path", &self.volid])?;
        let path = path.trim();
        if path.is_empty() {
            bail!("pvesm returned no path for {}", self.volid);
        }
        Ok(PathBuf::from(path))
    }
}

impl Action for IsoImage {
    fn id(&self) -> String {
        self.volid.clone()
    }

    fn description(&self) -> String {
        format!("Download ISO {} to {}", self.volid, self.storage)
    }

    fn action_type(&self) -> &'static str {
        "iso_image"
    }

    fn details(&self) -> Option<String> {
        let check = match &self.sha256 {
            Some(sum) => format!("sha256 {sum}"),
            None => "no checksum".to_string(),
        };
        Some(format!("{} ({check})", self.url))
    }

    fn provides(&self) -> Vec<String> {
        vec![volume_key(&self.volid)]
    }

    fn requires(&self) -> Vec<String> {
        vec![storage_key(&self.storage)]
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let output = ctx
            .runner
            .run_capture("pvesm", &["list", &self.storage, "--content", "iso"])?;
        Ok(if table_lists(&output, &self.volid) {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Absent
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let dest = self.destination(ctx)?;
        download(&self.url, &dest, self.sha256.as_deref())?;
        Ok(ApplyResult::Created)
    }
}

/// Stream `url` to `dest`, checking the SHA-256 when one is expected
///
/// The body lands in a `.part` file that is only renamed into place once
/// the checksum matches.
pub fn download(url: &str, dest: &Path, expected: Option<&str>) -> Result<()> {
    log::info!("Downloading {url}");
    let response = ureq::Agent::new_with_defaults()
        .get(url)
        .header("User-Agent", USER_AGENT)
        .call()
        .with_context(|| format!("Failed to download {url}"))?;
    let mut reader = response.into_body().into_reader();
    store(&mut reader, dest, expected).with_context(|| format!("Failed to download {url}"))
}

/// Write a stream to `dest` through a `.part` file
///
/// The partial file is removed on every failure.
fn store<R: Read>(reader: &mut R, dest: &Path, expected: Option<&str>) -> Result<()> {
    let mut partial = dest.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let result = write_partial(reader, &partial)
        .and_then(|digest| finish_download(&partial, dest, &digest, expected));
    if result.is_err() {
        // nothing useful to do if the cleanup fails too
        let _ = fs::remove_file(&partial);
    }
    result
}

fn write_partial<R: Read>(reader: &mut R, partial: &Path) -> Result<String> {
    let mut file = File::create(partial)
        .with_context(|| format!("Failed to create {}", partial.display()))?;
    let digest = copy_hashed(reader, &mut file)
        .with_context(|| format!("Failed to write {}", partial.display()))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {}", partial.display()))?;
    Ok(digest)
}

fn finish_download(
    partial: &Path,
    dest: &Path,
    digest: &str,
    expected: Option<&str>,
) -> Result<()> {
    if let Some(expected) = expected
        && !digest.eq_ignore_ascii_case(expected)
    {
        bail!(
            "checksum mismatch for {}: expected {expected}, got {digest}",
            dest.display()
        );
    }
    fs::rename(partial, dest)
        .with_context(|| format!("Failed to move download to {}", dest.display()))?;
    log::info!("Saved {}", dest.display());
    Ok(())
}

/// Copy everything from `reader` to `writer`, returning the hex SHA-256
pub fn copy_hashed<R: Read, W: Write>(reader: &mut R, writer: &mut W) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::mock::MockRunner;
    use crate::schema::TemplateKind;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn iso_request() -> TemplateRequest {
        TemplateRequest {
            os_id: "debian12-iso".to_string(),
            kind: TemplateKind::Iso,
            source: "https://cdimage.debian.org/debian-cd/current/amd64/iso-cd/\
debian-12.7.0-amd64-netinst.iso"
                .to_string(),
            sha256: None,
            storage: "local".to_string(),
        }
    }

    #[test]
    fn test_copy_hashed() {
        let mut out = Vec::new();
        let digest = copy_hashed(&mut "abc".as_bytes(), &mut out).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(out, b"abc");

        let digest = copy_hashed(&mut io::empty(), &mut io::sink()).unwrap();
        assert_eq!(digest, EMPTY_SHA256);
    }

    /// Yields some bytes, then a reset connection
    struct BrokenStream {
        sent: bool,
    }

    impl Read for BrokenStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::from(io::ErrorKind::ConnectionReset));
            }
            self.sent = true;
            buf[..4].copy_from_slice(b"ISO!");
            Ok(4)
        }
    }

    #[test]
    fn test_checksum_mismatch_discards_partial() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("debian.iso");

        let wrong = "0".repeat(64);
        let err = store(&mut io::empty(), &dest, Some(&wrong)).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
        assert!(!dir.path().join("debian.iso.part").exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_broken_stream_discards_partial() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("iso").join("debian.iso");

        let mut stream = BrokenStream { sent: false };
        store(&mut stream, &dest, None).unwrap_err();
        assert!(!dir.path().join("iso/debian.iso.part").exists());
        assert!(!dest.exists());
    }

    #[test]
    fn test_matching_checksum_moves_into_place() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("debian.iso");

        let expected = EMPTY_SHA256.to_uppercase();
        store(&mut io::empty(), &dest, Some(&expected)).unwrap();
        assert!(dest.exists());
        assert!(!dir.path().join("debian.iso.part").exists());
    }

    #[test]
    fn test_iso_state_from_pvesm_list() {
        let iso = IsoImage::new(&iso_request());
        assert_eq!(iso.volid, "local:iso/debian-12.7.0-amd64-netinst.iso");

        let runner = MockRunner::new().ok(
            "pvesm list local --content iso",
            "Volid Format Type Size VMID\n\
local:iso/debian-12.7.0-amd64-netinst.iso iso iso 658505728\n",
        );
        let ctx = ApplyContext::new(false, &runner);
        assert!(iso.is_satisfied(&ctx).unwrap());
    }

    #[test]
    fn test_container_template_requires_index() {
        let request = TemplateRequest {
            os_id: "debian12".to_string(),
            kind: TemplateKind::Container,
            source: "debian-12-standard_12.7-1_amd64.tar.zst".to_string(),
            sha256: None,
            storage: "local".to_string(),
        };
        let template = ContainerTemplate::new(&request);
        assert_eq!(template.requires(), vec!["storage:local", "template_index"]);

        let runner = MockRunner::new().ok(
            "pveam download local debian-12-standard_12.7-1_amd64.tar.zst",
            "",
        );
        let mut ctx = ApplyContext::new(false, &runner);
        assert!(matches!(template.apply(&mut ctx).unwrap(), ApplyResult::Created));
    }

    #[test]
    fn test_template_index_always_runs() {
        let runner = MockRunner::new();
        let ctx = ApplyContext::new(false, &runner);
        assert!(!TemplateIndex.is_satisfied(&ctx).unwrap());
        assert!(TemplateIndex.verify(&ctx).unwrap());
    }
}
