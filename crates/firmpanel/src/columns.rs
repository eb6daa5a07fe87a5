//! Column catalogue for the Orbis and Compustat sources and the cleaned panel.
//!
//! Extraction selects from three Orbis tables (company identifiers, industry
//! classifications, and the cash-flow financials) joined on [`FIRM_ID`]. The
//! cleaning stage types a fixed subset of those columns: [`TEXT`] columns are cast
//! to `VARCHAR`, [`NUMERIC`] columns to `DOUBLE`, and [`CLOSE_DATE`] to a timestamp.
//! Columns extracted but absent from both lists are dropped by the cleaning stage.

/// Firm identifier shared by every Orbis table.
pub const FIRM_ID: &str = "bvdid";

/// Statement closing date, the only column typed during staging.
pub const CLOSE_DATE: &str = "closdate";

/// Country column used for the deflator join.
pub const COUNTRY: &str = "ctryiso";

/// Filing type column and the value that marks an annual report.
pub const FILING_TYPE: &str = "filing_type";
/// Value of [`FILING_TYPE`] preferred by the deduplication rule.
pub const ANNUAL_REPORT: &str = "Annual report";

/// Original reporting currency.
pub const ORIG_CURRENCY: &str = "orig_currency";

/// Exchange rate from the original currency to USD.
pub const EXCHANGE_RATE: &str = "exchrate";

/// Fiscal year derived during cleaning.
pub const FISCAL_YEAR: &str = "year";

/// Emerging markets by MSCI classification (ISO 3166-1 alpha-2).
pub const EM_COUNTRIES: &[&str] = &[
    "BR", "CL", "CN", "CO", "CZ", "EG", "GR", "HU", "IN", "ID", "KR", "KW",
    "MY", "MX", "PE", "PH", "PL", "QA", "SA", "ZA", "TW", "TH", "TR", "AE",
];

/// Static firm descriptors from the company id table.
///
/// The country column is not listed here because its source name differs by
/// size bucket; see [`SizeBucket::country_column`](crate::SizeBucket::country_column).
pub const STATIC: &[&str] = &[
    "name_internat", "name_native", "akaname",
    "slegalf", "legalfrm", "dateinc", "dateinc_year", "dateinc_char",
    "lei_lei", "sd_ticker", "sd_isin", "city_internat", "city_native",
    "country", "region_in_country", "bvdid", "category_of_company",
];

/// Sector and activity codes from the industry classifications table.
pub const SECTOR: &[&str] = &[
    "major_sector", "nace2_main_section", "naceccod2", "nacecdes2",
    "nacepcod2", "nacepdes2", "naicsccod2017", "naicscdes2017",
    "ussicccod", "ussiccdes",
];

/// Time-varying financial items from the small-firm cash-flow table (`_s`).
pub const FINANCIAL_SMALL: &[&str] = &[
    "closdate", "filing_type", "orig_currency", "exchrate",
    "fias", "ifas", "tfas", "ofas", "cuas", "debt", "ocas", "toas",
    "capi", "ltdb", "wkca", "ncas", "empl", "opre", "turn", "taxa",
    "staf", "inte", "cf", "ace", "df_employees", "emp_orig_range_value",
    "av", "ncli", "oncl", "culi", "ocli", "tshf", "_315506", "_315507",
    "_315522", "cost", "depr", "expt", "_315501", "_315502",
    "fiex", "shfd", "osfd", "cash", "ebta", "oppl", "pl",
    "fdpp", "fdpc", "fcdp", "_315524", "_315525", "_315523",
];

/// Time-varying financial items from the medium and large cash-flow tables
/// (`_m`, `_l`). These tables lack the funds-flow items of the small-firm table
/// and carry a `has_cashflow_tables` flag instead.
pub const FINANCIAL_MEDLARGE: &[&str] = &[
    "closdate", "filing_type", "orig_currency", "exchrate",
    "fias", "ifas", "tfas", "ofas", "cuas", "debt", "ocas", "toas",
    "capi", "ltdb", "wkca", "ncas", "empl", "opre", "turn", "taxa",
    "staf", "inte", "cf", "ace", "df_employees", "emp_orig_range_value",
    "av", "ncli", "oncl", "culi", "ocli", "tshf", "_315506", "_315507",
    "_315522", "cost", "depr", "expt", "_315501", "_315502",
    "fiex", "shfd", "osfd", "cash", "ebta", "oppl", "pl",
    "has_cashflow_tables",
];

/// Columns kept as text by the cleaning stage.
pub const TEXT: &[&str] = &[
    "name_internat", "name_native", "akaname", "slegalf", "legalfrm",
    "dateinc", "dateinc_year", "dateinc_char", "lei_lei", "sd_ticker",
    "sd_isin", "city_internat", "city_native", "country", "region_in_country",
    "category_of_company", "ctryiso", "major_sector", "nace2_main_section",
    "naceccod2", "nacecdes2", "nacepcod2", "nacepdes2", "naicsccod2017",
    "naicscdes2017", "ussicccod", "ussiccdes", "emp_orig_range_value",
    "orig_currency", "filing_type", "bvdid",
];

/// Columns cast to `DOUBLE` by the cleaning stage.
pub const NUMERIC: &[&str] = &[
    "toas", "ifas", "tfas", "ofas", "cuas", "turn", "empl", "debt", "ocas",
    "capi", "ltdb", "wkca", "ncas", "opre", "taxa", "staf", "inte", "cf",
    "ace", "av", "ncli", "oncl", "culi", "ocli", "tshf", "_315501",
    "_315502", "_315506", "_315507", "_315522", "cost", "depr", "fiex",
    "shfd", "osfd", "cash", "ebta", "oppl", "pl", "exchrate",
];

/// Classification codes that must all be present for a row to be kept.
pub const CLASSIFICATION: &[&str] = &[
    "ussicccod", "naicsccod2017", "naceccod2", "nace2_main_section",
];

/// At least one of these size measures must be present for a row to be kept.
pub const SIZE_MEASURES: &[&str] = &["turn", "opre", "empl", "toas"];

/// Rows with a negative (or missing) value in any of these columns are dropped.
pub const NON_NEGATIVE: &[&str] = &["turn", "cuas", "empl"];

/// Compustat annual fundamentals columns, `fyear` last.
pub const COMPUSTAT: &[&str] = &[
    "gvkey", "conm", "fyr", "naicsh", "sich", "ap", "invt", "rect",
    "rectr", "oancf", "capx", "fyear",
];

/// Monetary columns: every numeric column except the exchange rate and headcount.
///
/// Each gets a deflated (`<col>_defl`) and a USD (`<col>_usd`) variant. Panels
/// built by earlier versions of this pipeline also carried `empl_defl` and
/// `empl_usd`; those columns are no longer produced, since `empl` counts
/// employees rather than currency.
pub fn monetary() -> impl Iterator<Item = &'static str> {
    NUMERIC
        .iter()
        .copied()
        .filter(|c| *c != EXCHANGE_RATE && *c != "empl")
}
