// Prompt texts. Every variable used here must be declared in the matching
// `TemplateId::fields` list; the catalog rejects anything else at startup.

pub(crate) const COMPANY_OVERVIEW: &str = "\
You are a financial analyst. Give a short overview of {{ company }}.

- Industry: {{ industry }}
- Sector: {{ sector }}
- Current stock price: {{ current_price | fixed }}
- Market capitalization: {{ market_cap | money }}
- Latest session trend: {{ trend }}

Describe the business, its position in the sector and what the current price \
movement suggests. Keep it under 200 words.";

pub(crate) const HEALTH_CHECK: &str = "\
Assess the financial health of the company from these figures:

- Revenue: {{ revenue | money }}
- Net income: {{ net_income | money }}
- EBITDA: {{ ebitda | money }}
- Operating margin: {{ operating_margin | pct }}
- Profit margin: {{ profit_margin | pct }}
- Quarterly basic EPS: {{ eps_trend }}

Comment on profitability, the EPS trajectory and any warning signs.";

pub(crate) const FINANCIAL_STABILITY: &str = "\
Evaluate the company's financial stability. Per reporting period:

{{ metrics }}

Discuss leverage, liquidity and cash generation, and how they changed over \
the periods shown.";

pub(crate) const VALUATION: &str = "\
Judge whether the stock is fairly valued using these multiples:

- Trailing P/E: {{ pe_trailing | fixed }}
- Forward P/E: {{ pe_forward | fixed }}
- Price to book: {{ pb_ratio | fixed }}
- PEG ratio: {{ peg_ratio | fixed }}
- EV/EBITDA: {{ ev_ebitda | fixed }}
- Dividend yield: {{ dividend_yield | pct }}
- Market capitalization: {{ market_cap | money }}

State whether the stock looks undervalued, fairly valued or overvalued.";

pub(crate) const MARKET_SENTIMENT: &str = "\
Analyze market sentiment for the stock.

Latest analyst recommendations: {{ analyst_rating }}

Recent daily closes, returns and annualized volatility:
{{ price_summary }}

Moving-average signal: {{ sentiment }}

Summarize how the market currently views the stock.";

pub(crate) const DECISION_MAKING: &str = "\
Based on the overview, financial health, stability, valuation and sentiment \
analysis above, make an investment decision. Answer with Buy, Hold or Sell \
followed by a short justification and the main risks to watch.";

/// Prefix carrying the cleaned outputs of earlier prompts
///
/// MiniJinja drops one trailing newline, the other separates the prefix from
/// the prompt.
pub(crate) const MEMORY: &str = "\
Previous analysis:
{% for section in memory %}
{{ section }}
{% endfor %}

";
