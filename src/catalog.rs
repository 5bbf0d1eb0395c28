//! Compiled-in table definitions for the showoci CSV exports.

use clap::ValueEnum;

use crate::{
    descriptor::{DateFormat, SqlType, TableSpec},
    error::LoadResult,
};

pub const COMPUTE_TABLE: &str = "OCI_SHOWOCI_COMPUTE";
pub const BLOCK_VOLUMES_TABLE: &str = "OCI_SHOWOCI_BLOCK_VOLUMES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum TableKind {
    Compute,
    BlockVolumes,
}

impl TableKind {
    /// Load order used when no table is selected explicitly.
    pub const ALL: [TableKind; 2] = [TableKind::Compute, TableKind::BlockVolumes];

    pub fn spec(self) -> LoadResult<TableSpec> {
        match self {
            TableKind::Compute => compute(),
            TableKind::BlockVolumes => block_volumes(),
        }
    }
}

/// Resolves the selected kinds into specs, defaulting to every table.
pub fn resolve(kinds: &[TableKind]) -> LoadResult<Vec<TableSpec>> {
    let selected: &[TableKind] = if kinds.is_empty() {
        &TableKind::ALL
    } else {
        kinds
    };
    let mut specs = Vec::with_capacity(selected.len());
    for kind in selected {
        let spec = kind.spec()?;
        if !specs.iter().any(|s: &TableSpec| s.name() == spec.name()) {
            specs.push(spec);
        }
    }
    Ok(specs)
}

pub fn compute() -> LoadResult<TableSpec> {
    TableSpec::builder(COMPUTE_TABLE, "compute.csv")
        .text("tenant_name", 1000)
        .text("tenant_id", 100)
        .key_text("instance_id", 1000)
        .text("region_name", 100)
        .text("availability_domain", 100)
        .text("fault_domain", 100)
        .text("compartment_path", 2000)
        .text("compartment_name", 1000)
        .text("server_name", 1000)
        .text("status", 100)
        .text("type", 1000)
        .text("image", 1000)
        .text("primary_vcn", 100)
        .text("primary_subnet", 100)
        .text("shape", 100)
        .number("ocpus")
        .number("memory_gb")
        .number("local_storage_tb")
        .text("public_ips", 500)
        .text("private_ips", 500)
        .text("security_groups", 1000)
        .text("internal_fqdn", 1000)
        .date("time_created", DateFormat::Minutes)
        .text("boot_volume", 100)
        .number("boot_volume_size_gb")
        .text("boot_volume_b_policy", 1000)
        .text("boot_volume_encryption", 20)
        .text("block_volumes", 1000)
        .number("block_volumes_total_gb")
        .text("block_volumes_b_policy", 1000)
        .text("defined_tags", 4000)
        .text("freeform_tags", 4000)
        .date("extract_date", DateFormat::Seconds)
        .build()
}

pub fn block_volumes() -> LoadResult<TableSpec> {
    TableSpec::builder(BLOCK_VOLUMES_TABLE, "block_volumes.csv")
        .text("tenant_name", 1000)
        .text("tenant_id", 100)
        .key_text("id", 1000)
        .text("region_name", 100)
        .text("availability_domain", 100)
        .text("fault_domain", 100)
        .text("compartment_path", 2000)
        .text("compartment_name", 1000)
        .text("display_name", 1000)
        .column("size_gb", "size", SqlType::Number, false)
        .text("backup_policy", 100)
        .number("vpus_per_gb")
        .text("volume_group_name", 1000)
        .text("instance_name", 100)
        .text("instance_id", 100)
        .text("defined_tags", 4000)
        .text("freeform_tags", 4000)
        .date("extract_date", DateFormat::Seconds)
        .build()
}
