//! The built-in probes.
//!
//! ```text
//! ClassProbe (init)
//!   -> PropertyProbe
//!        -> AttributeProbe
//!        -> AssociationProbe
//!        -> PropertyCountProbe
//!             -> ScalarProbe
//! ```

use futures_util::future::BoxFuture;

use crate::error::QuarryResult;
use crate::vocab::RDF_TYPE;

use super::probe::{Probe, ProbeContext};
use super::{FactBundle, ObservationKind, Observations, Slot};

/// Classes and their instance counts.
pub struct ClassProbe;

impl Probe for ClassProbe {
    fn name(&self) -> &str {
        "class"
    }

    fn triggers(&self) -> &[ObservationKind] {
        &[]
    }

    fn produces(&self) -> &[ObservationKind] {
        &[ObservationKind::ClassFact]
    }

    fn observe<'a>(
        &'a self,
        ctx: &'a ProbeContext,
        _input: &'a [FactBundle],
    ) -> BoxFuture<'a, QuarryResult<Observations>> {
        Box::pin(async move {
            tracing::info!("observing classes and their number of instances");
            let query = format!(
                "{prefix}
                CONSTRUCT {{
                    [] a se:ClassObservation ;
                       se:describedClass ?class ;
                       se:numberOfInstances ?numberOfInstances .
                }} WHERE {{
                    {{
                        SELECT ?class (COUNT(?resource) AS ?numberOfInstances)
                        WHERE {{
                            ?resource a ?class .
                            FILTER(isIRI(?class))
                        }}
                        GROUP BY ?class
                    }}
                }}",
                prefix = ctx.prefix_declaration()
            );
            ctx.construct(&query).await
        })
    }
}

/// Which properties instances of each class use.
pub struct PropertyProbe;

impl Probe for PropertyProbe {
    fn name(&self) -> &str {
        "property"
    }

    fn triggers(&self) -> &[ObservationKind] {
        &[ObservationKind::ClassFact]
    }

    fn produces(&self) -> &[ObservationKind] {
        &[ObservationKind::PropertyExistenceFact]
    }

    fn observe<'a>(
        &'a self,
        ctx: &'a ProbeContext,
        input: &'a [FactBundle],
    ) -> BoxFuture<'a, QuarryResult<Observations>> {
        Box::pin(async move {
            tracing::info!(classes = input.len(), "observing properties");
            ctx.construct_each(input, |fact| {
                let class = fact.iri(Slot::DescribedClass)?;
                Ok(Some(format!(
                    "{prefix}
                    CONSTRUCT {{
                        [] a se:PropertyExistenceObservation ;
                           se:propertyOf <{class}> ;
                           se:propertyIri ?property .
                    }} WHERE {{
                        {{
                            SELECT DISTINCT ?property
                            WHERE {{
                                ?instance a <{class}> ;
                                          ?property ?value .
                                FILTER(?property != <{RDF_TYPE}>)
                            }}
                        }}
                    }}",
                    prefix = ctx.prefix_declaration()
                )))
            })
            .await
        })
    }
}

fn property_of(fact: &FactBundle) -> QuarryResult<(&str, &str)> {
    Ok((fact.iri(Slot::PropertyOf)?, fact.iri(Slot::PropertyIri)?))
}

/// One sample literal per (datatype, language) pair of each property.
pub struct AttributeProbe;

impl Probe for AttributeProbe {
    fn name(&self) -> &str {
        "attribute"
    }

    fn triggers(&self) -> &[ObservationKind] {
        &[ObservationKind::PropertyExistenceFact]
    }

    fn produces(&self) -> &[ObservationKind] {
        &[ObservationKind::AttributeFact]
    }

    fn observe<'a>(
        &'a self,
        ctx: &'a ProbeContext,
        input: &'a [FactBundle],
    ) -> BoxFuture<'a, QuarryResult<Observations>> {
        Box::pin(async move {
            tracing::debug!(properties = input.len(), "observing properties as attributes");
            let sample = ctx.config().property_sample_size;
            ctx.construct_each(input, |fact| {
                let (class, property) = property_of(fact)?;
                Ok(Some(format!(
                    "{prefix}
                    CONSTRUCT {{
                        [] a se:AttributeObservation ;
                           se:describedAttribute <{property}> ;
                           se:attributeSourceClass <{class}> ;
                           se:targetLiteral ?targetLiteral .
                    }} WHERE {{
                        {{
                            SELECT (SAMPLE(?literal) AS ?targetLiteral)
                            WHERE {{
                                {{
                                    SELECT ?literal
                                    WHERE {{
                                        ?instance a <{class}> ;
                                                  <{property}> ?literal .
                                        FILTER(isLiteral(?literal))
                                    }}
                                    LIMIT {sample}
                                }}
                            }}
                            GROUP BY (DATATYPE(?literal)) (LANG(?literal))
                        }}
                    }}",
                    prefix = ctx.prefix_declaration()
                )))
            })
            .await
        })
    }
}

/// Classes of the resources each property points at.
pub struct AssociationProbe;

impl Probe for AssociationProbe {
    fn name(&self) -> &str {
        "association"
    }

    fn triggers(&self) -> &[ObservationKind] {
        &[ObservationKind::PropertyExistenceFact]
    }

    fn produces(&self) -> &[ObservationKind] {
        &[ObservationKind::AssociationFact]
    }

    fn observe<'a>(
        &'a self,
        ctx: &'a ProbeContext,
        input: &'a [FactBundle],
    ) -> BoxFuture<'a, QuarryResult<Observations>> {
        Box::pin(async move {
            tracing::debug!(properties = input.len(), "observing properties as associations");
            let sample = ctx.config().property_sample_size;
            ctx.construct_each(input, |fact| {
                let (class, property) = property_of(fact)?;
                Ok(Some(format!(
                    "{prefix}
                    CONSTRUCT {{
                        [] a se:AssociationObservation ;
                           se:describedAssociation <{property}> ;
                           se:associationSourceClass <{class}> ;
                           se:targetClass ?targetClass .
                    }} WHERE {{
                        {{
                            SELECT DISTINCT ?targetClass
                            WHERE {{
                                {{
                                    SELECT ?target
                                    WHERE {{
                                        ?instance a <{class}> ;
                                                  <{property}> ?target .
                                        FILTER(!isLiteral(?target))
                                    }}
                                    LIMIT {sample}
                                }}
                                ?target a ?targetClass .
                                FILTER(isIRI(?targetClass))
                            }}
                        }}
                    }}",
                    prefix = ctx.prefix_declaration()
                )))
            })
            .await
        })
    }
}

/// How many values each property has, up to the configured ceiling.
pub struct PropertyCountProbe;

impl Probe for PropertyCountProbe {
    fn name(&self) -> &str {
        "property-count"
    }

    fn triggers(&self) -> &[ObservationKind] {
        &[ObservationKind::PropertyExistenceFact]
    }

    fn produces(&self) -> &[ObservationKind] {
        &[ObservationKind::PropertyCountFact]
    }

    fn observe<'a>(
        &'a self,
        ctx: &'a ProbeContext,
        input: &'a [FactBundle],
    ) -> BoxFuture<'a, QuarryResult<Observations>> {
        Box::pin(async move {
            if !ctx.config().should_count_properties {
                tracing::debug!("property counting disabled, skipping");
                return Ok(Observations::new());
            }
            let limit = match ctx.config().max_property_count {
                Some(max) => format!("LIMIT {max}"),
                None => String::new(),
            };
            tracing::debug!(properties = input.len(), %limit, "counting properties");
            ctx.construct_each(input, |fact| {
                let (class, property) = property_of(fact)?;
                Ok(Some(format!(
                    "{prefix}
                    CONSTRUCT {{
                        [] a se:PropertyCountObservation ;
                           se:countedProperty <{property}> ;
                           se:countedPropertySourceClass <{class}> ;
                           se:numberOfPropertyInstances ?numberOfInstances .
                    }} WHERE {{
                        {{
                            SELECT (COUNT(*) AS ?numberOfInstances)
                            WHERE {{
                                {{
                                    SELECT ?instance ?value
                                    WHERE {{
                                        ?instance a <{class}> ;
                                                  <{property}> ?value .
                                    }}
                                    {limit}
                                }}
                            }}
                        }}
                    }}",
                    prefix = ctx.prefix_declaration()
                )))
            })
            .await
        })
    }
}

/// Properties proven to hold at most one value per instance.
pub struct ScalarProbe;

impl Probe for ScalarProbe {
    fn name(&self) -> &str {
        "scalar"
    }

    fn triggers(&self) -> &[ObservationKind] {
        &[ObservationKind::PropertyCountFact]
    }

    fn produces(&self) -> &[ObservationKind] {
        &[ObservationKind::PropertyIsScalarFact]
    }

    fn observe<'a>(
        &'a self,
        ctx: &'a ProbeContext,
        input: &'a [FactBundle],
    ) -> BoxFuture<'a, QuarryResult<Observations>> {
        Box::pin(async move {
            if !ctx.config().should_detect_non_array_properties {
                tracing::debug!("scalar property detection disabled, skipping");
                return Ok(Observations::new());
            }
            let max = ctx.config().max_property_count;
            ctx.construct_each(input, |fact| {
                let class = fact.iri(Slot::CountedPropertySourceClass)?;
                let property = fact.iri(Slot::CountedProperty)?;
                let count = fact.count(Slot::NumberOfPropertyInstances)?;
                // Too many values to check quickly.
                if max.is_some_and(|max| count >= max) {
                    return Ok(None);
                }
                Ok(Some(format!(
                    "{prefix}
                    CONSTRUCT {{
                        [] a se:PropertyIsAPartialFunctionObservation ;
                           se:partialFunctionProperty <{property}> .
                    }} WHERE {{
                        FILTER NOT EXISTS {{
                            ?instance a <{class}> ;
                                      <{property}> ?first , ?second .
                            FILTER(!sameTerm(?first, ?second))
                        }}
                    }}",
                    prefix = ctx.prefix_declaration()
                )))
            })
            .await
        })
    }
}
