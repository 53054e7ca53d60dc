use crate::errors::PipelineError;

/// Static description of the EDC (eau distribuée par commune) source on
/// www.data.gouv.fr.  One zip archive per year, three files per archive.
pub const BASE_URL: &str = "https://www.data.gouv.fr/fr/datasets/r/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearDescriptor {
    pub year: &'static str,
    pub remote_id: &'static str,
    pub archive_name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSpec {
    pub table_name: &'static str,
    pub file_name_prefix: &'static str,
    pub file_extension: &'static str,
}

/// Ascending, no gaps.
const YEARLY_FILES: &[YearDescriptor] = &[
    YearDescriptor {
        year: "2015",
        remote_id: "4af5ba06-1c37-4503-b045-95e7e4dd2e31",
        archive_name: "dis-2015.zip",
    },
    YearDescriptor {
        year: "2016",
        remote_id: "0f2ed80d-3b51-4f59-abbc-22ce1c5efc91",
        archive_name: "dis-2016.zip",
    },
    YearDescriptor {
        year: "2017",
        remote_id: "c04e79f1-4b65-4c1e-9534-1bd57c8c6b2f",
        archive_name: "dis-2017.zip",
    },
    YearDescriptor {
        year: "2018",
        remote_id: "8cf71852-09b0-4798-9368-b70b41da8a25",
        archive_name: "dis-2018.zip",
    },
    YearDescriptor {
        year: "2019",
        remote_id: "b3b3e0e8-3d91-40c7-92cc-c0ae53068f69",
        archive_name: "dis-2019.zip",
    },
    YearDescriptor {
        year: "2020",
        remote_id: "a6cdcfa9-a529-442c-ab6a-a2235a12b4bb",
        archive_name: "dis-2020.zip",
    },
    YearDescriptor {
        year: "2021",
        remote_id: "d5ec4d4e-8919-4df1-be8e-4e4e0f7ad282",
        archive_name: "dis-2021.zip",
    },
    YearDescriptor {
        year: "2022",
        remote_id: "84a67a3b-08a7-4001-98f8-9f26139d0c08",
        archive_name: "dis-2022.zip",
    },
    YearDescriptor {
        year: "2023",
        remote_id: "c89dec4a-d985-447c-a102-75ba814c398e",
        archive_name: "dis-2023.zip",
    },
    YearDescriptor {
        year: "2024",
        remote_id: "f775f144-68ee-4b28-bb0f-a3e4a4bb7871",
        archive_name: "dis-2024.zip",
    },
];

/// One entry per logical file within a yearly archive.  The order is
/// stable and drives every per-table operation; the first entry doubles
/// as the proxy table for the freshness check.
const FILES: &[FileSpec] = &[
    FileSpec {
        table_name: "edc_communes",
        file_name_prefix: "DIS_COM_UDI_",
        file_extension: ".txt",
    },
    FileSpec {
        table_name: "edc_prelevements",
        file_name_prefix: "DIS_PLV_",
        file_extension: ".txt",
    },
    FileSpec {
        table_name: "edc_resultats",
        file_name_prefix: "DIS_RESULT_",
        file_extension: ".txt",
    },
];

pub fn available_years() -> Vec<String> {
    YEARLY_FILES.iter().map(|d| d.year.to_string()).collect()
}

pub fn describe(year: &str) -> Result<&'static YearDescriptor, PipelineError> {
    YEARLY_FILES
        .iter()
        .find(|d| d.year == year)
        .ok_or_else(|| PipelineError::UnknownYear(year.to_string()))
}

pub fn file_specs() -> &'static [FileSpec] {
    FILES
}

pub fn table_names() -> impl Iterator<Item = &'static str> {
    FILES.iter().map(|f| f.table_name)
}

/// Name of the extracted file for one FileSpec and year, e.g. `DIS_PLV_2024.txt`.
pub fn yearly_filename(spec: &FileSpec, year: &str) -> String {
    format!(
        "{}{}{}",
        spec.file_name_prefix, year, spec.file_extension
    )
}
