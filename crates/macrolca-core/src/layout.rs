//! On-disk locations of every stage's output under one data directory.

use std::path::{Path, PathBuf};

pub const FILTER_DIR: &str = "04_Filter_output";
pub const CALC_DIR: &str = "05_Calculations_output";
pub const PROCESSING_DIR: &str = "06_Data_processing_output";
pub const PRICE_DIR: &str = "07_Price_data";
pub const VISUALISATION_DIR: &str = "07_Visualisation_output";
pub const SUMMARY_DIR: &str = "10_data_processing_tables_scenarios_output";

#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DataLayout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn filter_dir(&self, title: &str) -> PathBuf {
        self.root.join(FILTER_DIR).join(title)
    }

    pub fn filtered_activities(&self, title: &str, project: &str, database: &str) -> PathBuf {
        self.filter_dir(title)
            .join("tmp")
            .join(project)
            .join(format!("activities_list_from_{database}_{title}.csv"))
    }

    pub fn filter_trace(&self, title: &str, project: &str, database: &str) -> PathBuf {
        self.filter_dir(title)
            .join("logs")
            .join(project)
            .join(format!("{database}_{title}_trace.json"))
    }

    pub fn merged_activities(&self, title: &str, project: &str) -> PathBuf {
        self.filter_dir(title)
            .join(format!("activities_list_merged_{project}_{title}.csv"))
    }

    pub fn calc_dir(&self) -> PathBuf {
        self.root.join(CALC_DIR)
    }

    pub fn calc_tmp(&self) -> PathBuf {
        self.calc_dir().join("tmp")
    }

    pub fn calc_logs(&self) -> PathBuf {
        self.calc_dir().join("logs")
    }

    /// `ext` is `csv` or `json`.
    pub fn raw_results(&self, database: &str, title: &str, ext: &str) -> PathBuf {
        self.calc_tmp()
            .join(format!("{database}_{title}_rawresults_df.{ext}"))
    }

    pub fn database_log(&self, database: &str, title: &str) -> PathBuf {
        self.calc_logs().join(format!("{database}_{title}_log.txt"))
    }

    pub fn run_log(&self, title: &str) -> PathBuf {
        self.calc_logs().join(format!("{title}_log.txt"))
    }

    /// Limited smoke-test runs are kept next to, not over, the full results.
    pub fn combined_raw_results(&self, title: &str, limit: Option<usize>, ext: &str) -> PathBuf {
        match limit {
            Some(n) => self
                .calc_dir()
                .join(format!("{title}_{n}_combined_rawresults_df.{ext}")),
            None => self
                .calc_tmp()
                .join(format!("{title}_combined_rawresults_df.{ext}")),
        }
    }

    pub fn cooked_results(&self, title: &str) -> PathBuf {
        self.root
            .join(PROCESSING_DIR)
            .join(format!("{title}_combined_cookedresults_df.csv"))
    }

    pub fn priced_results(&self, title: &str) -> PathBuf {
        self.root
            .join(PRICE_DIR)
            .join(format!("{title}_combined_cookedresults_df_priced.csv"))
    }

    pub fn visualisation_dir(&self) -> PathBuf {
        self.root.join(VISUALISATION_DIR)
    }

    pub fn boxplot_dir(&self) -> PathBuf {
        self.visualisation_dir().join("boxplots")
    }

    pub fn scatter_dir(&self) -> PathBuf {
        self.visualisation_dir().join("scatterplots-method")
    }

    pub fn trend_dir(&self) -> PathBuf {
        self.visualisation_dir().join("scatterplots-trend")
    }

    /// `base` is `log10` or `ln`.
    pub fn regression_stats(&self, base: &str) -> PathBuf {
        self.visualisation_dir()
            .join(format!("waste_vs_impacts_{base}_stats.csv"))
    }

    pub fn summary_dir(&self) -> PathBuf {
        self.root.join(SUMMARY_DIR)
    }
}

/// File-name-safe form of a column label: spaces and slashes become `_`.
pub fn file_stem(label: &str) -> String {
    label.replace([' ', '/'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_paths() {
        let l = DataLayout::new("data");
        assert_eq!(
            l.filtered_activities("markets", "T-reX_macro", "SSP1-PkBudg500-2030"),
            PathBuf::from("data/04_Filter_output/markets/tmp/T-reX_macro/activities_list_from_SSP1-PkBudg500-2030_markets.csv")
        );
        assert_eq!(
            l.merged_activities("markets", "T-reX_macro"),
            PathBuf::from("data/04_Filter_output/markets/activities_list_merged_T-reX_macro_markets.csv")
        );
        assert_eq!(
            l.raw_results("db", "markets", "csv"),
            PathBuf::from("data/05_Calculations_output/tmp/db_markets_rawresults_df.csv")
        );
        assert_eq!(
            l.cooked_results("markets"),
            PathBuf::from("data/06_Data_processing_output/markets_combined_cookedresults_df.csv")
        );
    }

    #[test]
    fn test_limited_runs_go_elsewhere() {
        let l = DataLayout::new("data");
        assert_eq!(
            l.combined_raw_results("markets", Some(5), "csv"),
            PathBuf::from("data/05_Calculations_output/markets_5_combined_rawresults_df.csv")
        );
        assert_eq!(
            l.combined_raw_results("markets", None, "csv"),
            PathBuf::from("data/05_Calculations_output/tmp/markets_combined_rawresults_df.csv")
        );
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Total waste (kg/kg)"), "Total_waste_(kg_kg)");
    }
}
