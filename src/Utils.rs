//! different utility modules used throughout the project
/// tiny module to save datasets and fit results into csv files
pub mod logger;
/// tiny module to plot trajectories and fit overlays
pub mod plots;
