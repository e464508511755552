use crate::binary::{Arch, Os, Platform};

/// Platform of the running process in binary-naming vocabulary, or `None`
/// when the host is not one the naming convention can express.
pub fn current_platform() -> Option<Platform> {
    platform_from_consts(std::env::consts::OS, std::env::consts::ARCH)
}

pub fn platform_from_consts(os: &str, arch: &str) -> Option<Platform> {
    let os = match os {
        "macos" => Os::Darwin,
        "dragonfly" => Os::Dragonfly,
        "freebsd" => Os::Freebsd,
        "linux" => Os::Linux,
        "netbsd" => Os::Netbsd,
        "openbsd" => Os::Openbsd,
        "windows" => Os::Windows,
        other => {
            tracing::debug!("No binary naming for operating system '{}'", other);
            return None;
        }
    };

    let arch = match arch {
        "x86_64" => Arch::Amd64,
        "x86" => Arch::I386,
        "arm" => Arch::Arm,
        other => {
            tracing::debug!("No binary naming for architecture '{}'", other);
            return None;
        }
    };

    Some(Platform::new(os, arch))
}
