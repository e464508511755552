use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static MATCH_BINARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(.*)[_-](darwin|dragonfly|freebsd|linux|netbsd|openbsd|plan9|windows)[_-](386|amd64|arm)(?:\.exe)?$",
    )
    .expect("binary name pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Darwin,
    Dragonfly,
    Freebsd,
    Linux,
    Netbsd,
    Openbsd,
    Plan9,
    Windows,
}

impl Os {
    pub const ALL: [Os; 8] = [
        Os::Darwin,
        Os::Dragonfly,
        Os::Freebsd,
        Os::Linux,
        Os::Netbsd,
        Os::Openbsd,
        Os::Plan9,
        Os::Windows,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Darwin => "darwin",
            Os::Dragonfly => "dragonfly",
            Os::Freebsd => "freebsd",
            Os::Linux => "linux",
            Os::Netbsd => "netbsd",
            Os::Openbsd => "openbsd",
            Os::Plan9 => "plan9",
            Os::Windows => "windows",
        }
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Os::ALL
            .into_iter()
            .find(|os| os.as_str() == s)
            .ok_or_else(|| format!("unrecognized operating system: {}", s))
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    I386,
    Amd64,
    Arm,
}

impl Arch {
    pub const ALL: [Arch; 3] = [Arch::I386, Arch::Amd64, Arch::Arm];

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::I386 => "386",
            Arch::Amd64 => "amd64",
            Arch::Arm => "arm",
        }
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::ALL
            .into_iter()
            .find(|arch| arch.as_str() == s)
            .ok_or_else(|| format!("unrecognized architecture: {}", s))
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An (os, arch) pair. Both halves always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// A program build for one platform, identified by its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    /// The name exactly as given (base name when parsed from a path)
    pub raw_name: String,
    pub program: String,
    /// `None` for a bare program name
    pub platform: Option<Platform>,
    /// Local file this descriptor was built from, if any
    pub source_path: Option<PathBuf>,
}

impl Binary {
    /// Parse a file name. Names that do not follow the naming convention
    /// become a bare program name with no platform.
    ///
    /// The program capture is greedy, so the last os/arch pair in the name
    /// wins: `foo_linux_arm_linux_amd64` is program `foo_linux_arm`.
    pub fn parse(name: &str) -> Self {
        match parse_parts(name) {
            Some((program, platform)) => Self {
                raw_name: name.to_string(),
                program,
                platform: Some(platform),
                source_path: None,
            },
            None => Self {
                raw_name: name.to_string(),
                program: name.to_string(),
                platform: None,
                source_path: None,
            },
        }
    }

    /// Parse the file name component of a local path and remember the path.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());
        Self {
            source_path: Some(path.to_path_buf()),
            ..Self::parse(&name)
        }
    }

    /// Same program, pinned to `platform`.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn is_qualified(&self) -> bool {
        self.platform.is_some()
    }

    pub fn extension(&self) -> &'static str {
        match self.platform {
            Some(Platform { os: Os::Windows, .. }) => ".exe",
            _ => "",
        }
    }

    /// `program-os-arch`, without extension
    pub fn identifier(&self) -> String {
        self.render('-', false)
    }

    /// `program_os_arch[.exe]`
    pub fn underscore(&self) -> String {
        self.render('_', true)
    }

    /// `program-os-arch[.exe]`
    pub fn dash(&self) -> String {
        self.render('-', true)
    }

    fn render(&self, sep: char, with_extension: bool) -> String {
        let Some(platform) = self.platform else {
            return self.program.clone();
        };
        let mut name = format!(
            "{}{sep}{}{sep}{}",
            self.program, platform.os, platform.arch
        );
        if with_extension {
            name.push_str(self.extension());
        }
        name
    }

    /// True when `candidate` names the same program built for the same
    /// platform. Names that do not parse never match.
    pub fn matches(&self, candidate: &str) -> bool {
        match (self.platform, parse_parts(candidate)) {
            (Some(platform), Some((program, other))) => {
                self.program == program && platform == other
            }
            _ => false,
        }
    }
}

impl fmt::Display for Binary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

/// True when `name` follows the binary naming convention.
pub fn is_binary_name(name: &str) -> bool {
    MATCH_BINARY.is_match(name)
}

fn parse_parts(name: &str) -> Option<(String, Platform)> {
    let caps = MATCH_BINARY.captures(name)?;
    let os = caps[2].parse().ok()?;
    let arch = caps[3].parse().ok()?;
    Some((caps[1].to_string(), Platform::new(os, arch)))
}
