//! Built-in provider definitions.
//!
//! The stock roster of dependencies the orchestrator knows out of the box.
//! Each entry is the same declarative [`ProviderSpec`] an override file
//! would produce, registered explicitly so the fallback chain stays an
//! ordered list rather than a naming-convention lookup.

use crate::provider::declared::{DeclaredProvider, PackageNames, ProviderSpec, SourceRecipe};
use crate::provider::Provider;
use std::sync::Arc;

/// The built-in provider set.
pub fn providers() -> Vec<Arc<dyn Provider>> {
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

    // zlib: ubiquitous, versioned via its header constant.
    let mut zlib = ProviderSpec::library("zlib", "zlib.h", "z")
        .with_source(SourceRecipe {
            url: "https://zlib.net/".into(),
            archive: "zlib-{version}.tar.gz".into(),
            dir: None,
            default_version: Some("1.3.1".into()),
            configure_args: Vec::new(),
        })
        .with_packages(PackageNames {
            brew: Some("zlib".into()),
            port: Some("zlib".into()),
            apt: Some("zlib1g-dev".into()),
            yum: Some("zlib-devel".into()),
            installer: None,
            installer_url: None,
        });
    zlib.version_constant = Some("ZLIB_VERSION".into());
    providers.push(Arc::new(DeclaredProvider::new(zlib)));

    // libpng depends on zlib being resolvable first.
    let mut libpng = ProviderSpec::library("libpng", "png.h", "png")
        .with_hints(&["libpng*"])
        .with_source(SourceRecipe {
            url: "https://download.sourceforge.net/libpng/".into(),
            archive: "libpng-{version}.tar.gz".into(),
            dir: None,
            default_version: Some("1.6.43".into()),
            configure_args: Vec::new(),
        })
        .with_packages(PackageNames {
            brew: Some("libpng".into()),
            port: Some("libpng".into()),
            apt: Some("libpng-dev".into()),
            yum: Some("libpng-devel".into()),
            installer: None,
            installer_url: None,
        })
        .with_dependencies(&["zlib"]);
    libpng.version_constant = Some("PNG_LIBPNG_VER_STRING".into());
    providers.push(Arc::new(DeclaredProvider::new(libpng)));

    // bzip2 library (no configure script upstream, so package managers
    // only; local builds fall back to the index-free mapping).
    providers.push(Arc::new(DeclaredProvider::new(
        ProviderSpec::library("bzip2", "bzlib.h", "bz2").with_packages(PackageNames {
            brew: Some("bzip2".into()),
            port: Some("bzip2".into()),
            apt: Some("libbz2-dev".into()),
            yum: Some("bzip2-devel".into()),
            installer: None,
            installer_url: None,
        }),
    )));

    // Build tools.
    providers.push(Arc::new(DeclaredProvider::new(
        ProviderSpec::program("cmake", "cmake").with_packages(PackageNames {
            brew: Some("cmake".into()),
            port: Some("cmake".into()),
            apt: Some("cmake".into()),
            yum: Some("cmake".into()),
            installer: Some("cmake-{version}-windows-x86_64.msi".into()),
            installer_url: Some("https://github.com/Kitware/CMake/releases/download/".into()),
        }),
    )));

    providers.push(Arc::new(DeclaredProvider::new(
        ProviderSpec::program("doxygen", "doxygen").with_packages(PackageNames {
            brew: Some("doxygen".into()),
            port: Some("doxygen".into()),
            apt: Some("doxygen".into()),
            yum: Some("doxygen".into()),
            installer: None,
            installer_url: None,
        }),
    )));

    providers.push(Arc::new(DeclaredProvider::new(
        ProviderSpec::program("pkg-config", "pkg-config").with_packages(PackageNames {
            brew: Some("pkg-config".into()),
            port: Some("pkgconfig".into()),
            apt: Some("pkg-config".into()),
            yum: Some("pkgconfig".into()),
            installer: None,
            installer_url: None,
        }),
    )));

    providers
}
