//! Hypothesis tests used by the threshold and enrichment engines.

pub mod discrete;

pub mod normality;
