//! A complete matrix product state.

use nutcracker_core::Result;

use crate::connector::connect_dimensions;
use crate::site::{Normalization, StateSite};

/// A matrix product state in right-canonical form: a middle-normalized first
/// site followed by right-normalized sites, outer bonds of dimension one.
#[derive(Debug, Clone)]
pub struct State {
    first_site: StateSite,
    rest_sites: Vec<StateSite>,
}

impl State {
    pub fn new(first_site: StateSite, rest_sites: Vec<StateSite>) -> Result<Self> {
        first_site.assert_normalization(&[Normalization::Middle])?;
        connect_dimensions(
            "first site left",
            first_site.left_dimension(),
            "chain boundary",
            1,
        )?;
        let mut previous_right = first_site.right_dimension();
        for site in &rest_sites {
            site.assert_normalization(&[Normalization::Right])?;
            previous_right = connect_dimensions(
                "previous site right",
                previous_right,
                "site left",
                site.left_dimension(),
            )
            .map(|_| site.right_dimension())?;
        }
        connect_dimensions("last site right", previous_right, "chain boundary", 1)?;
        Ok(Self {
            first_site,
            rest_sites,
        })
    }

    pub fn number_of_sites(&self) -> usize {
        1 + self.rest_sites.len()
    }

    pub fn first_site(&self) -> &StateSite {
        &self.first_site
    }

    pub fn rest_sites(&self) -> &[StateSite] {
        &self.rest_sites
    }

    pub fn site(&self, index: usize) -> &StateSite {
        if index == 0 {
            &self.first_site
        } else {
            &self.rest_sites[index - 1]
        }
    }

    /// Sites in chain order.
    pub fn sites(&self) -> impl Iterator<Item = &StateSite> {
        std::iter::once(&self.first_site).chain(self.rest_sites.iter())
    }

    pub fn physical_dimensions(&self) -> Vec<usize> {
        self.sites().map(|s| s.physical_dimension()).collect()
    }
}
