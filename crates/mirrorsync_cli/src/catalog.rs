//! City and country catalog entities.

use clap::ValueEnum;
use mirrorsync_store::{Syncable, SyncableDto};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// An entity type served by the catalog API.
pub trait CatalogEntity: Syncable + Serialize + DeserializeOwned {
    /// Wire representation of one entry.
    type Dto: SyncableDto<Self> + DeserializeOwned + Send + 'static;

    /// Path of the collection endpoint, relative to the base URL.
    const PATH: &'static str;

    /// One-line human-readable description.
    fn summary(&self) -> String;
}

/// Collections the CLI can mirror.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    /// Cities with their working areas
    Cities,
    /// Countries
    Countries,
}

/// A city served by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// City code, unique across the catalog.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Code of the country the city belongs to.
    pub country_code: String,
    /// Encoded working-area polygons, separated by spaces.
    pub working_area: String,
}

impl Syncable for City {
    const COLLECTION: &'static str = "cities";

    fn identity_key(&self) -> &str {
        &self.code
    }
}

/// A city as returned by `GET /api/cities`.
#[derive(Debug, Clone, Deserialize)]
pub struct CityDto {
    /// City code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Country code.
    pub country_code: String,
    /// Encoded working-area polygons.
    #[serde(default)]
    pub working_area: Vec<String>,
}

impl SyncableDto<City> for CityDto {
    fn identity_key(&self) -> String {
        self.code.clone()
    }

    fn apply(&self, city: &mut City) -> bool {
        let working_area = self.working_area.join(" ");
        // Non-short-circuiting so every field is written.
        set_if_changed(&mut city.code, &self.code)
            | set_if_changed(&mut city.name, &self.name)
            | set_if_changed(&mut city.country_code, &self.country_code)
            | set_if_changed(&mut city.working_area, &working_area)
    }
}

impl CatalogEntity for City {
    type Dto = CityDto;
    const PATH: &'static str = "api/cities";

    fn summary(&self) -> String {
        let polygons = self.working_area.split_whitespace().count();
        format!(
            "{:<6} {:<24} {:<4} {} polygon(s)",
            self.code, self.name, self.country_code, polygons
        )
    }
}

/// A country served by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    /// Country code.
    pub code: String,
    /// Display name.
    pub name: String,
}

impl Syncable for Country {
    const COLLECTION: &'static str = "countries";

    fn identity_key(&self) -> &str {
        &self.code
    }
}

/// A country as returned by `GET /api/countries`.
#[derive(Debug, Clone, Deserialize)]
pub struct CountryDto {
    /// Country code.
    pub code: String,
    /// Display name.
    pub name: String,
}

impl SyncableDto<Country> for CountryDto {
    fn identity_key(&self) -> String {
        self.code.clone()
    }

    fn apply(&self, country: &mut Country) -> bool {
        set_if_changed(&mut country.code, &self.code)
            | set_if_changed(&mut country.name, &self.name)
    }
}

impl CatalogEntity for Country {
    type Dto = CountryDto;
    const PATH: &'static str = "api/countries";

    fn summary(&self) -> String {
        format!("{:<4} {}", self.code, self.name)
    }
}

fn set_if_changed(field: &mut String, value: &str) -> bool {
    if field.as_str() == value {
        return false;
    }
    value.clone_into(field);
    true
}
