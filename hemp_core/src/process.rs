//! The hemp biomass fractionation process.
//!
//! Builds the feed record and the eleven-stage pipeline from a [`Config`].
//! Everything here is data: the rules themselves live in [`crate::rules`].

use crate::pipeline::{Operation, Pipeline, Stage};
use crate::rules::{FractionMap, Reference, Rule};
use crate::{Component, Config, MassRecord};

/// Name of the seeded feed stream
pub const FEED: &str = "Hemp Biomass";

/// Wet plant mass entering the process, split by plant part
pub fn feed_record(config: &Config) -> MassRecord {
    let rate = config.feed.rate;
    MassRecord::from_pairs(&[
        (Component::Seeds, rate * config.yields.seed),
        (Component::Stems, rate * config.yields.stem()),
        (Component::Leaves, rate * config.yields.leaf),
    ])
}

/// Share of harvested moisture that travels with the seeds
fn seed_moisture_share(config: &Config) -> f64 {
    let seed = config.yields.seed * config.moisture.seed;
    let stem = config.yields.stem() * config.moisture.stem;
    if seed + stem > 0.0 {
        seed / (seed + stem)
    } else {
        0.0
    }
}

/// Converts a wet plant part into its dry mass plus moisture
fn wet_to_dry(part: Component, dry_as: Component, moisture: f64) -> Rule {
    Rule::compose(part, &[(dry_as, 1.0 - moisture), (Component::Moisture, moisture)])
}

fn keep(fraction: f64) -> Rule {
    Rule::split(FractionMap::uniform(fraction))
}

/// Build the canonical stage sequence
pub fn hemp_pipeline(config: &Config) -> Pipeline {
    let m = &config.moisture;
    let stems = &config.stems;
    let deco = &config.decortication;

    let harvest = Stage::new("Harvesting Biomass")
        .consumes(&[FEED])
        .produces(&["Harvested Biomass"])
        .then(Operation::to_stream(
            FEED,
            "Harvested Biomass",
            Rule::split(FractionMap::uniform(1.0).with(Component::Leaves, 0.0)),
            "Leaf Waste",
        ))
        .then(Operation::apply(
            "Leaf Waste",
            "Leaf Waste",
            wet_to_dry(Component::Leaves, Component::Waste, m.leaf),
        ))
        .then(Operation::retire("Leaf Waste", "Leaf Waste"))
        .then(Operation::apply(
            "Harvested Biomass",
            "Harvested Biomass",
            wet_to_dry(Component::Seeds, Component::Seeds, m.seed),
        ))
        .then(Operation::apply(
            "Harvested Biomass",
            "Harvested Biomass",
            wet_to_dry(Component::Stems, Component::Stems, m.stem),
        ));

    let separation = Stage::new("Separation of Seeds and Stems")
        .consumes(&["Harvested Biomass"])
        .produces(&["Separated Seeds", "Separated Stems"])
        .then(Operation::to_stream(
            "Harvested Biomass",
            "Separated Seeds",
            Rule::split(
                FractionMap::uniform(0.0)
                    .with(Component::Seeds, 1.0)
                    .with(Component::Moisture, seed_moisture_share(config)),
            ),
            "Separated Stems",
        ))
        .then(Operation::to_loss(
            "Separated Seeds",
            "Separated Seeds",
            keep(1.0 - stems.separation_loss),
            "Separation Loss",
        ))
        .then(Operation::to_loss(
            "Separated Stems",
            "Separated Stems",
            keep(1.0 - stems.separation_loss),
            "Separation Loss",
        ));

    let seed_drying = Stage::new("Seed Drying")
        .consumes(&["Separated Seeds"])
        .produces(&["Dried Seeds"])
        .then(Operation::to_loss(
            "Separated Seeds",
            "Dried Seeds",
            Rule::moisture_adjust(m.seed_target),
            "Seed Drying Loss",
        ));

    let seed = &config.seed;
    let seed_composition = Stage::new("Seed Composition")
        .consumes(&["Dried Seeds"])
        .produces(&["Composed Seeds"])
        .then(Operation::apply(
            "Dried Seeds",
            "Composed Seeds",
            Rule::compose(
                Component::Seeds,
                &[
                    (Component::Seeds, 1.0 - seed.cbd_content - seed.oil_content),
                    (Component::Cbd, seed.cbd_content),
                    (Component::Oil, seed.oil_content),
                ],
            ),
        ));

    let ex = &config.extraction;
    let oil_extraction = Stage::new("Oil Extraction")
        .consumes(&["Composed Seeds"])
        .produces(&["Extracted Seed Oils"])
        .then(Operation::to_stream(
            "Composed Seeds",
            "Processed Seeds",
            Rule::split(
                FractionMap::uniform(1.0)
                    .with(Component::Cbd, 1.0 - ex.cbd_efficiency)
                    .with(Component::Oil, 1.0 - ex.oil_efficiency),
            ),
            "Extracted Seed Oils",
        ))
        .then(Operation::retire("Processed Seeds", "Processed Seeds Waste"))
        .then(Operation::to_loss(
            "Extracted Seed Oils",
            "Extracted Seed Oils",
            keep(1.0 - ex.loss),
            "Seed Extraction Loss",
        ));

    let cream = &config.cream;
    let cream_production = Stage::new("Cream Production")
        .consumes(&["Extracted Seed Oils"])
        .produces(&["Cream Product"])
        .then(Operation::apply(
            "Extracted Seed Oils",
            "Cream Product",
            // Ratios are per kg of oil extracted, before the extraction loss
            Rule::additive(
                Reference::Gross {
                    component: Component::Oil,
                    retained: 1.0 - ex.loss,
                },
                &[
                    (Component::Additives, cream.additives_ratio),
                    (Component::Water, cream.water_ratio),
                    (Component::Glycerol, cream.glycerol_ratio),
                ],
            ),
        ))
        .then(Operation::to_loss(
            "Cream Product",
            "Cream Product",
            keep(1.0 - cream.mixing_loss),
            "Cream Mixing Loss",
        ));

    let stem_drying = Stage::new("Stem Drying")
        .consumes(&["Separated Stems"])
        .produces(&["Dried Stems"])
        .then(Operation::to_loss(
            "Separated Stems",
            "Dried Stems",
            Rule::moisture_adjust(m.stem_target),
            "Stem Drying Loss",
        ));

    let retting = Stage::new("Retting")
        .consumes(&["Dried Stems"])
        .produces(&["Retting Output"])
        .then(Operation::to_loss(
            "Dried Stems",
            "Retting Output",
            keep(1.0 - stems.retting_loss),
            "Retting Loss",
        ));

    let chemistry = |c: &crate::config::Chemistry| {
        Rule::compose(
            Component::Stems,
            &[
                (Component::Cellulose, c.cellulose),
                (Component::Hemicellulose, c.hemicellulose),
                (Component::Lignin, c.lignin),
                (Component::Extractives, c.extractives),
            ],
        )
    };
    let decortication = Stage::new("Decortication")
        .consumes(&["Retting Output"])
        .produces(&["Decorticated Bark", "Decorticated Core"])
        .then(Operation::to_stream(
            "Retting Output",
            "Decorticated Bark",
            keep(deco.bark_fraction),
            "Decorticated Core",
        ))
        .then(Operation::apply(
            "Decorticated Bark",
            "Decorticated Bark",
            chemistry(&deco.bark),
        ))
        .then(Operation::apply(
            "Decorticated Core",
            "Decorticated Core",
            chemistry(&deco.core),
        ))
        .then(Operation::to_loss(
            "Decorticated Bark",
            "Decorticated Bark",
            keep(1.0 - stems.decortication_loss),
            "Decortication Loss",
        ))
        .then(Operation::to_loss(
            "Decorticated Core",
            "Decorticated Core",
            keep(1.0 - stems.decortication_loss),
            "Decortication Loss",
        ));

    let fiber = &config.fiber;
    let fiber_extraction = Stage::new("Fiber Extraction")
        .consumes(&["Decorticated Bark", "Decorticated Core"])
        .produces(&["Bark Fibers", "Core Fibers"])
        .then(Operation::to_loss(
            "Decorticated Bark",
            "Bark Fibers",
            Rule::split(FractionMap::uniform(1.0).with(Component::Cellulose, fiber.bark_recovery)),
            "Fiber Extraction Loss",
        ))
        .then(Operation::to_loss(
            "Decorticated Core",
            "Core Fibers",
            Rule::split(FractionMap::uniform(1.0).with(Component::Cellulose, fiber.core_recovery)),
            "Fiber Extraction Loss",
        ));

    let pack = &config.packaging;
    let packaging = Stage::new("Packaging Production")
        .consumes(&["Bark Fibers", "Core Fibers"])
        .produces(&["Cream Jars", "Outer Packaging"])
        // Jars from core fibers
        .then(Operation::to_loss(
            "Core Fibers",
            "Cream Jars",
            keep(1.0 - pack.jar_loss),
            "Jar Production Loss",
        ))
        .then(Operation::apply(
            "Cream Jars",
            "Cream Jars",
            Rule::additive(
                Reference::Total,
                &[(Component::Biopolymer, pack.jar_biopolymer_ratio)],
            ),
        ))
        // Boxes from bark fibers
        .then(Operation::to_loss(
            "Bark Fibers",
            "Outer Packaging",
            keep(1.0 - pack.box_loss),
            "Box Production Loss",
        ))
        .then(Operation::apply(
            "Outer Packaging",
            "Outer Packaging",
            Rule::additive(Reference::Total, &[(Component::Binder, pack.box_binder_ratio)]),
        ));

    Pipeline::new(vec![
        harvest,
        separation,
        seed_drying,
        seed_composition,
        oil_extraction,
        cream_production,
        stem_drying,
        retting,
        decortication,
        fiber_extraction,
        packaging,
    ])
}
