//! Agent definitions: which prompt each analysis sends and what it returns
//! when the model stays silent or the call fails.

use super::{AgentSpec, PromptSource};

pub const GLOBAL_OVERVIEW: AgentSpec = AgentSpec {
    name: "global overview",
    source: PromptSource::Stored {
        id: "pmpt_6887dbd520548196b288b61816a837a901c90dc46b715c8f",
        version: "1",
    },
    web_search: false,
    retry_rate_limits: true,
    backoff: (3, 2),
    no_output: "No output returned.",
    failure: "Failed to fetch global overview.",
};

pub const VERTICAL: AgentSpec = AgentSpec {
    name: "vertical segments",
    source: PromptSource::Stored {
        id: "pmpt_68890ae213f4819090dbf34cea8dc026040ce09fec32ba6f",
        version: "1",
    },
    web_search: false,
    retry_rate_limits: true,
    backoff: (3, 2),
    no_output: "(no output)",
    failure: "Failed to retrieve vertical sub-markets.",
};

pub const HORIZONTAL: AgentSpec = AgentSpec {
    name: "horizontal markets",
    source: PromptSource::Stored {
        id: "pmpt_68890d096ab481968567c3d89d5e714c0ca0c19fe44835b6",
        version: "1",
    },
    web_search: false,
    retry_rate_limits: true,
    backoff: (3, 2),
    no_output: "(no output)",
    failure: "Failed to retrieve horizontal sub-markets.",
};

pub const APPLICATIONS: AgentSpec = AgentSpec {
    name: "applications",
    source: PromptSource::Template(applications_prompt),
    web_search: true,
    retry_rate_limits: true,
    backoff: (3, 2),
    no_output: "(no output)",
    failure: "Failed to retrieve market applications.",
};

pub const TECHNOLOGY_SEGMENTS: AgentSpec = AgentSpec {
    name: "technology segments",
    source: PromptSource::Template(technology_prompt),
    web_search: true,
    retry_rate_limits: true,
    backoff: (3, 2),
    no_output: "(no output)",
    failure: "Failed to retrieve market technology segments.",
};

pub const PRODUCT_CATEGORIES: AgentSpec = AgentSpec {
    name: "product categories",
    source: PromptSource::Template(product_categories_prompt),
    web_search: true,
    retry_rate_limits: false,
    backoff: (3, 2),
    no_output: "No product category data found",
    failure: "Failed to get product categories",
};

pub const END_USER: AgentSpec = AgentSpec {
    name: "end-user analysis",
    source: PromptSource::Template(end_user_prompt),
    web_search: true,
    retry_rate_limits: false,
    backoff: (3, 2),
    no_output: "No end-user data found",
    failure: "Failed to get end-user analysis",
};

pub const REGIONAL: AgentSpec = AgentSpec {
    name: "regional analysis",
    source: PromptSource::Stored {
        id: "pmpt_68ca3e7bd6248196a2bdce6267d45ee20ce220380e811494",
        version: "5",
    },
    web_search: false,
    retry_rate_limits: false,
    backoff: (3, 2),
    no_output: "No regional data found",
    failure: "Failed to get regional analysis",
};

pub const RELATED_MARKETS: AgentSpec = AgentSpec {
    name: "related markets",
    source: PromptSource::Stored {
        id: "pmpt_68fb0ea6c850819585c25e168d89e2bf0b2e0207465f0fd4",
        version: "3",
    },
    web_search: false,
    retry_rate_limits: true,
    backoff: (3, 2),
    no_output: "(no output)",
    failure: "Failed to retrieve related markets.",
};

/// Backoff is `2 * attempt` counted from one.
pub const MERGERS: AgentSpec = AgentSpec {
    name: "mergers and acquisitions",
    source: PromptSource::Stored {
        id: "pmpt_6887e2f23c9c81959d041e23c50f22d8024bea49ae171cac",
        version: "1",
    },
    web_search: true,
    retry_rate_limits: true,
    backoff: (2, 2),
    no_output: "No output returned.",
    failure: "Failed to retrieve M&A data after retries.",
};

pub const WEB_INSIGHTS: (&str, &str) = (
    "pmpt_688912c5d8cc8197b40a0409ce168ac2056afb650c14b3be",
    "1",
);

pub const TOP_COMPANIES: (&str, &str) = (
    "pmpt_68842d6c0b448196a868674711e6639409c9f231eee31359",
    "2",
);
pub const TOP_COMPANIES_NO_OUTPUT: &str = "No output from the model.";

pub const DETAILED_METRICS: (&str, &str) = (
    "pmpt_6887def9d9a08195bb898ddc5bc4a12106162e31af023a7b",
    "1",
);
pub const DETAILED_METRICS_NO_OUTPUT: &str = "No output message from model.";

fn applications_prompt(market: &str) -> String {
    format!(
        r#"Analyze the {market} market by APPLICATION segments. Focus on HOW this technology is USED in different contexts.

Present results as a table:
| Application Area | Description | Target Users | Market Share | Growth Rate | Key Players |

Focus only on USE CASES and APPLICATIONS, not general market trends.

Examples for EV:
- Personal Transportation (individual cars)
- Commercial Delivery (delivery trucks)
- Public Transit (buses)
- Fleet Operations (corporate fleets)
- Ride-sharing (Uber/Lyft)
- Industrial (mining, construction)

Search for current data on each application segment."#
    )
}

fn technology_prompt(market: &str) -> String {
    format!(
        r#"Analyze the {market} market by TECHNOLOGY segments. Focus on the different underlying TECHNOLOGIES, technical approaches, or technological categories.

Present results as a table:
| Technology Type | Description | Technical Features | Market Share | Maturity Level | Key Players | Performance Advantages |

Focus only on TECHNOLOGIES and TECHNICAL APPROACHES, not applications or use cases.

Examples for EV Technologies:
- Battery Electric (BEV) - Pure electric with large batteries
- Plug-in Hybrid (PHEV) - Battery + engine, pluggable
- Hybrid Electric (HEV) - Battery + engine, non-pluggable
- Fuel Cell (FCEV) - Hydrogen fuel cell technology
- Mild Hybrid - Small battery assist

Examples for AI Technologies:
- Machine Learning - Algorithm-based learning
- Deep Learning - Neural network architectures
- Natural Language Processing - Text/speech processing
- Computer Vision - Image/video analysis
- Reinforcement Learning - Reward-based learning

Search for current technical specifications and market data for each technology type."#
    )
}

fn product_categories_prompt(market: &str) -> String {
    format!(
        r#"Analyze the {market} market by PRODUCT CATEGORY segments. Focus on different PRODUCT TYPES and VARIANTS.

**Required Output Format - Present as Table:**
| Product Category | Description | Target Segment | Market Share | Price Range | Key Players | Sources |

**Focus on PRODUCT CATEGORIES, not applications or technologies.**

For {market} market, show the main product types, categories, and variants available. Include market share data and key manufacturers for each category.

Search for recent product portfolio and market segmentation data."#
    )
}

fn end_user_prompt(market: &str) -> String {
    format!(
        r#"Search for current market data and analyze the {market} market by END-USER segments. Focus on WHO uses these products/services.

I need REAL DATA with actual market figures. Find current statistics and create a table:

| End-User Segment | Market Size (USD) | Share (%) | Key Needs/Requirements | Growth Rate | Purchasing Behavior | Key Players Serving | Source |
|------------------|-------------------|-----------|------------------------|-------------|---------------------|---------------------|--------|

For the {market} market, identify major end-user categories such as:
- Individual Consumers/Households
- Small/Medium Businesses
- Large Enterprises
- Government/Public Sector
- Healthcare Providers
- Educational Institutions
- Industrial Manufacturers

Search for recent market segmentation data showing:
- Actual revenue/market size by end-user type
- Real market share percentages
- Growth rates by segment
- Specific needs and requirements of each user group

Do NOT use placeholder values. Find real 2023-2025 market data."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_mention_market() {
        for render in [
            applications_prompt as fn(&str) -> String,
            technology_prompt,
            product_categories_prompt,
            end_user_prompt,
        ] {
            let prompt = render("Plastics in Automotive");
            assert!(prompt.contains("Plastics in Automotive market"));
            assert!(prompt.contains('|'));
        }
    }
}
