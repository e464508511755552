use crate::binary::{is_binary_name, Binary};
use crate::directory::ReleaseDirectory;
use crate::error::Result;
use crate::host::ReleaseHost;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub asset: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    NoReleases { location: String },
    NoBinaries { location: String },
    Rows(Vec<ListRow>),
}

/// Binary-named assets of every release, newest release first. With a
/// `program`, only its builds are listed; a program naming a platform
/// (`app_linux_amd64`) narrows the listing to that one kind.
pub async fn list_binaries<H: ReleaseHost + ?Sized>(
    host: &H,
    program: Option<&str>,
) -> Result<Listing> {
    let directory = ReleaseDirectory::fetch(host).await?;
    let location = host.location();
    if directory.is_empty() {
        return Ok(Listing::NoReleases { location });
    }

    let wanted = program.map(Binary::parse);
    let rows: Vec<ListRow> = directory
        .assets()
        .filter(|(_, asset)| is_binary_name(&asset.name))
        .filter(|(_, asset)| match &wanted {
            Some(binary) if binary.is_qualified() => binary.matches(&asset.name),
            Some(binary) => Binary::parse(&asset.name).program == binary.program,
            None => true,
        })
        .map(|(release, asset)| ListRow {
            asset: asset.name.clone(),
            tag: release.tag_name.clone(),
        })
        .collect();

    if rows.is_empty() {
        return Ok(Listing::NoBinaries { location });
    }
    Ok(Listing::Rows(rows))
}
