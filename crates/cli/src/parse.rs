//! ArgMatches → CliAction conversion.

use clap::ArgMatches;
use serde_json::Value;
use veclayer::{DeleteSelector, JsonScalar, MetadataFilter};

/// One operator command, fully parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum CliAction {
    /// Print registered backend names. Needs no connection.
    Backends,
    /// Anything that runs against an open layer.
    Layer(LayerAction),
}

/// A command that needs a connected backend.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerAction {
    /// Print collection names.
    List,
    /// Existence check.
    Has { collection: String },
    /// Full enumeration.
    Get { collection: String },
    /// Metadata equality query.
    Query {
        collection: String,
        filter: MetadataFilter,
        limit: Option<usize>,
    },
    /// Nearest-neighbour search.
    Search {
        collection: String,
        vectors: Vec<Vec<f32>>,
        limit: Option<usize>,
    },
    /// Item deletion.
    Delete {
        collection: String,
        selector: DeleteSelector,
    },
    /// Collection drop.
    Drop { collection: String },
    /// Drop everything under the prefix.
    Reset,
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    let (sub, m) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    match sub {
        "backends" => Ok(CliAction::Backends),
        other => layer_action(other, m).map(CliAction::Layer),
    }
}

fn layer_action(sub: &str, m: &ArgMatches) -> Result<LayerAction, String> {
    match sub {
        "list" => Ok(LayerAction::List),
        "has" => Ok(LayerAction::Has {
            collection: collection(m)?,
        }),
        "get" => Ok(LayerAction::Get {
            collection: collection(m)?,
        }),
        "query" => Ok(LayerAction::Query {
            collection: collection(m)?,
            filter: parse_filter(strings(m, "where"))?,
            limit: parse_limit(m)?,
        }),
        "search" => {
            let vectors = strings(m, "vector")
                .iter()
                .map(|raw| parse_vector(raw))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(LayerAction::Search {
                collection: collection(m)?,
                vectors,
                limit: parse_limit(m)?,
            })
        }
        "delete" => {
            let ids = strings(m, "id");
            let selector = if !ids.is_empty() {
                DeleteSelector::Ids(ids)
            } else {
                let filter = parse_filter(strings(m, "where"))?;
                if filter.is_empty() {
                    return Err("delete needs --id or --where".to_string());
                }
                DeleteSelector::Filter(filter)
            };
            Ok(LayerAction::Delete {
                collection: collection(m)?,
                selector,
            })
        }
        "drop" => Ok(LayerAction::Drop {
            collection: collection(m)?,
        }),
        "reset" => {
            if !m.get_flag("yes") {
                return Err("reset drops every collection under the prefix; pass --yes".to_string());
            }
            Ok(LayerAction::Reset)
        }
        other => Err(format!("Unknown command: {}", other)),
    }
}

fn collection(m: &ArgMatches) -> Result<String, String> {
    m.get_one::<String>("collection")
        .cloned()
        .ok_or_else(|| "Missing collection".to_string())
}

fn strings(m: &ArgMatches, id: &str) -> Vec<String> {
    m.get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn parse_limit(m: &ArgMatches) -> Result<Option<usize>, String> {
    m.get_one::<String>("limit")
        .map(|s| s.parse::<usize>())
        .transpose()
        .map_err(|e| format!("Invalid limit: {}", e))
}

// =========================================================================
// Values
// =========================================================================

/// Parse `key=value` pairs into an equality filter.
///
/// The value is read as a JSON scalar when it parses as one, otherwise as a
/// bare string, so `topic=pets`, `n=3` and `flag=true` all work.
pub fn parse_filter(pairs: Vec<String>) -> Result<MetadataFilter, String> {
    let mut filter = MetadataFilter::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Invalid --where '{}': expected KEY=VALUE", pair))?;
        if key.is_empty() {
            return Err(format!("Invalid --where '{}': empty key", pair));
        }
        filter = filter.eq(key, parse_scalar(raw)?);
    }
    Ok(filter)
}

/// Parse a filter value.
pub fn parse_scalar(raw: &str) -> Result<JsonScalar, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => JsonScalar::from_json(&value)
            .ok_or_else(|| format!("Filter values must be scalars, got '{}'", raw)),
        Err(_) => Ok(JsonScalar::String(raw.to_string())),
    }
}

/// Parse a JSON array of numbers.
pub fn parse_vector(raw: &str) -> Result<Vec<f32>, String> {
    let vector: Vec<f32> =
        serde_json::from_str(raw).map_err(|e| format!("Invalid vector '{}': {}", raw, e))?;
    if vector.is_empty() {
        return Err("Vector must not be empty".to_string());
    }
    Ok(vector)
}
