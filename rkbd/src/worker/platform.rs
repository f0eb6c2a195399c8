use oci_spec::image::{Arch, Os, Platform};

use crate::error::{ActivationError, Result};

const KNOWN_OS: &[&str] = &[
    "aix",
    "android",
    "darwin",
    "dragonfly",
    "freebsd",
    "hurd",
    "illumos",
    "ios",
    "js",
    "linux",
    "netbsd",
    "openbsd",
    "plan9",
    "solaris",
    "windows",
    "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386",
    "amd64",
    "arm",
    "armbe",
    "arm64",
    "arm64be",
    "loong64",
    "mips",
    "mipsle",
    "mips64",
    "mips64le",
    "ppc",
    "ppc64",
    "ppc64le",
    "riscv",
    "riscv64",
    "s390",
    "s390x",
    "sparc",
    "sparc64",
    "wasm",
];

/// Parse platform identifiers, see [`parse_platform`].
pub fn parse_platforms(specs: &[String]) -> Result<Vec<Platform>> {
    specs.iter().map(|spec| parse_platform(spec)).collect()
}

/// Parse one of `os`, `arch`, `os/arch` or `os/arch/variant`.
///
/// A bare OS takes the host architecture, a bare architecture takes the host
/// OS. Architecture aliases and variants are normalized, so `linux/arm`
/// becomes `linux/arm/v7` and `linux/arm64/v8` becomes `linux/arm64`.
pub fn parse_platform(spec: &str) -> Result<Platform> {
    let invalid = || ActivationError::InvalidPlatform(spec.to_string());
    let normalized = spec.trim().to_lowercase();
    let parts = normalized.split('/').collect::<Vec<_>>();
    if parts.iter().any(|part| !is_valid_component(part)) {
        return Err(invalid());
    }

    let (os, (arch, variant)) = match parts.as_slice() {
        [single] => {
            let os = normalize_os(single);
            if KNOWN_OS.contains(&os) {
                (os.to_string(), host_arch())
            } else {
                let (arch, variant) = normalize_arch(single, None);
                if !KNOWN_ARCH.contains(&arch.as_str()) {
                    return Err(invalid());
                }
                (std::env::consts::OS.to_string(), (arch, variant))
            }
        }
        [os, arch] => (normalize_os(os).to_string(), normalize_arch(arch, None)),
        [os, arch, variant] => (
            normalize_os(os).to_string(),
            normalize_arch(arch, Some(*variant)),
        ),
        _ => return Err(invalid()),
    };

    Ok(platform(&os, &arch, variant))
}

/// The platform the daemon itself runs on.
pub fn host_platform() -> Platform {
    let (arch, variant) = host_arch();
    platform(std::env::consts::OS, &arch, variant)
}

/// Formats a platform back into its `os/arch[/variant]` identifier.
pub fn format_platform(platform: &Platform) -> String {
    match platform.variant() {
        Some(variant) => format!("{}/{}/{variant}", platform.os(), platform.architecture()),
        None => format!("{}/{}", platform.os(), platform.architecture()),
    }
}

fn platform(os: &str, arch: &str, variant: Option<String>) -> Platform {
    let mut platform = Platform::default();
    platform
        .set_os(Os::from(os))
        .set_architecture(Arch::from(arch))
        .set_variant(variant);
    platform
}

fn is_valid_component(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn host_arch() -> (String, Option<String>) {
    normalize_arch(std::env::consts::ARCH, None)
}

fn normalize_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn normalize_arch(arch: &str, variant: Option<&str>) -> (String, Option<String>) {
    let variant = variant.unwrap_or_default();
    let (arch, variant) = match arch {
        "x86_64" | "x86-64" | "amd64" => ("amd64", if variant == "v1" { "" } else { variant }),
        "i386" | "i686" | "x86" => ("386", ""),
        "aarch64" | "arm64" => (
            "arm64",
            match variant {
                "8" | "v8" | "v8.0" => "",
                "9" | "9.0" | "v9.0" => "v9",
                other => other,
            },
        ),
        "armhf" => ("arm", "v7"),
        "armel" => ("arm", "v6"),
        "arm" => (
            "arm",
            match variant {
                "" | "7" => "v7",
                "5" => "v5",
                "6" => "v6",
                "8" => "v8",
                other => other,
            },
        ),
        "loongarch64" => ("loong64", variant),
        other => (other, variant),
    };
    let variant = (!variant.is_empty()).then(|| variant.to_string());
    (arch.to_string(), variant)
}

#[cfg(test)]
mod tests {
    use super::{format_platform, host_platform, parse_platform, parse_platforms};
    use crate::error::ActivationError;

    fn parsed(spec: &str) -> String {
        format_platform(&parse_platform(spec).unwrap())
    }

    #[test]
    fn test_parse_platform() {
        assert_eq!(parsed("linux/amd64"), "linux/amd64");
        assert_eq!(parsed("Linux/x86_64/v1"), "linux/amd64");
        assert_eq!(parsed("linux/aarch64/v8"), "linux/arm64");
        assert_eq!(parsed("linux/arm64/v9.0"), "linux/arm64/v9");
        assert_eq!(parsed("linux/arm"), "linux/arm/v7");
        assert_eq!(parsed("linux/arm/6"), "linux/arm/v6");
        assert_eq!(parsed("linux/armhf"), "linux/arm/v7");
        assert_eq!(parsed("windows/amd64"), "windows/amd64");
    }

    #[test]
    fn test_parse_single_component() {
        let host = format_platform(&host_platform());
        let host_arch = host.split_once('/').unwrap().1;

        assert_eq!(parsed("linux"), format!("linux/{host_arch}"));
        assert_eq!(parsed("macos"), format!("darwin/{host_arch}"));

        let os = std::env::consts::OS;
        assert_eq!(parsed("arm64"), format!("{os}/arm64"));
        assert_eq!(parsed("aarch64"), format!("{os}/arm64"));
        assert_eq!(parsed("arm"), format!("{os}/arm/v7"));
    }

    #[test]
    fn test_invalid_platforms() {
        for spec in [
            "linux/",
            "/amd64",
            "linux/arm/v7/extra",
            "",
            "toaster",
            "linux/am d64",
            "linux//arm",
        ] {
            assert!(
                matches!(parse_platform(spec), Err(ActivationError::InvalidPlatform(_))),
                "{spec} should be rejected"
            );
        }

        let specs = vec!["linux/amd64".to_string(), "toaster".to_string()];
        match parse_platforms(&specs) {
            Err(ActivationError::InvalidPlatform(spec)) => assert_eq!(spec, "toaster"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_host_platform() {
        let host = format_platform(&host_platform());
        assert!(host.starts_with(std::env::consts::OS));
        assert!(!host.contains("x86_64") && !host.contains("aarch64"));
    }
}
