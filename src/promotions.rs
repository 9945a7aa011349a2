//! Promotions page scraper.
//!
//! The page repeats one `.grid-parent` block per offer: a `.greyBox img`
//! banner and a `.details` column holding the bold title (`h3 strong`), run
//! dates (`h6 strong`), an optional call-to-action link (`h4 a`) and the
//! `.fineprint` legal text. Blocks missing the banner or the details column
//! are skipped whole.

use crate::normalization::platform::Platform;
use anyhow::{anyhow, Result};
use itertools::Itertools;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    /// Straight price discount ("Save $10 on ...").
    Save,
    /// Bonus trade-in credit ("Get 15% extra towards ...").
    Trade,
}

impl OfferType {
    pub fn classify(title: &str) -> Option<Self> {
        if title.contains("Save ") {
            Some(OfferType::Save)
        } else if title.contains("towards ") {
            Some(OfferType::Trade)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionOffer {
    pub title: String,
    #[serde(rename = "type")]
    pub offer_type: Option<OfferType>,
    pub discount: Option<u32>,
    pub discount_platforms: Vec<String>,
    pub image: Option<String>,
    pub run_dates: Option<String>,
    pub in_store_only: bool,
    pub fineprint: String,
    pub link: Option<String>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

/// Concatenated text of every match of `sel` under `el`, like a jQuery `.text()`.
fn text_of(el: ElementRef<'_>, sel: &Selector) -> String {
    el.select(sel).flat_map(|e| e.text()).collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Protocol-relative sources get an `https:` scheme.
fn absolute_image(src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        None
    } else if src.starts_with("//") {
        Some(format!("https:{src}"))
    } else {
        Some(src.to_string())
    }
}

pub struct PromotionParser {
    block: Selector,
    image: Selector,
    details: Selector,
    title: Selector,
    fineprint: Selector,
    run_dates: Selector,
    link: Selector,
    discount_re: Regex,
    platform_re: Regex,
    exclude_re: Regex,
    include_re: Regex,
}

impl PromotionParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            block: selector(".grid-parent")?,
            image: selector(".greyBox img")?,
            details: selector(".details")?,
            title: selector("h3 strong")?,
            fineprint: selector(".fineprint")?,
            run_dates: selector("h6 strong")?,
            link: selector("h4 a")?,
            discount_re: Regex::new(r"(\d+)% extra")?,
            platform_re: Regex::new(
                r"(?i)\b(?:ps5|playstation\s*5|ps4|playstation\s*4|xbox\s+series\s+x(?:\s*[/|]\s*s)?|xbox\s+series\s+s|xbox\s+one|nintendo\s+switch|switch)\b",
            )?,
            exclude_re: Regex::new(r"(?i)\bexclud")?,
            include_re: Regex::new(r"(?i)\b(?:valid|applies|apply|eligible|includ\w*|but)\b")?,
        })
    }

    pub fn parse(&self, html: &str) -> Vec<PromotionOffer> {
        let doc = Html::parse_document(html);
        let mut skipped = 0usize;
        let offers: Vec<PromotionOffer> = doc
            .select(&self.block)
            .filter_map(|block| {
                let offer = self.parse_block(block);
                if offer.is_none() {
                    skipped += 1;
                }
                offer
            })
            .collect();
        info!(offers = offers.len(), skipped, "parsed promotions page");
        offers
    }

    fn parse_block(&self, block: ElementRef<'_>) -> Option<PromotionOffer> {
        let img = block.select(&self.image).next()?;
        let details = block.select(&self.details).next()?;

        let title = text_of(details, &self.title).trim().to_string();
        let offer_type = OfferType::classify(&title);
        let raw_fineprint = text_of(details, &self.fineprint);

        let (discount, discount_platforms) = if offer_type == Some(OfferType::Trade) {
            (
                self.discount(&title),
                self.discount_platforms(&raw_fineprint),
            )
        } else {
            (None, Vec::new())
        };

        let run_dates = text_of(details, &self.run_dates);
        let run_dates = run_dates.trim();
        let run_dates = (!run_dates.is_empty())
            .then(|| run_dates.replacen("Run Dates: ", "", 1).trim().to_string());

        let link = details
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(str::to_string);

        let offer = PromotionOffer {
            title,
            offer_type,
            discount,
            discount_platforms,
            image: img.value().attr("src").and_then(absolute_image),
            run_dates,
            in_store_only: raw_fineprint.contains("store only"),
            fineprint: collapse_whitespace(&raw_fineprint),
            link,
        };
        debug!(title = %offer.title, kind = ?offer.offer_type, "parsed offer");
        Some(offer)
    }

    /// `"<N>% extra"` as an integer percent.
    pub fn discount(&self, text: &str) -> Option<u32> {
        self.discount_re
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// Platforms named in the fine print, minus any the fine print excludes.
    ///
    /// Exclusions are judged per sentence. Inside a sentence with an "exclude"
    /// word, a platform after the keyword is excluded, and so is one before it
    /// unless a clause break (`,` `;` `:`) or an inclusion word ("valid",
    /// "applies", "but") sits in between. An excluded platform is dropped everywhere.
    pub fn discount_platforms(&self, fineprint: &str) -> Vec<String> {
        let mut excluded: HashSet<Platform> = HashSet::new();
        for sentence in fineprint.split('.') {
            let Some(kw) = self.exclude_re.find(sentence) else {
                continue;
            };
            for m in self.platform_re.find_iter(sentence) {
                let negated = if m.start() > kw.start() {
                    true
                } else {
                    let gap = &sentence[m.end()..kw.start()];
                    !gap.contains(&[',', ';', ':'][..]) && !self.include_re.is_match(gap)
                };
                if negated {
                    if let Some(p) = Platform::from_token(m.as_str()) {
                        excluded.insert(p);
                    }
                }
            }
        }

        self.platform_re
            .find_iter(fineprint)
            .filter_map(|m| Platform::from_token(m.as_str()).map(|p| (p, m.as_str())))
            .filter(|(p, _)| !excluded.contains(p))
            .unique_by(|(p, _)| *p)
            .map(|(_, token)| token.to_string())
            .collect()
    }
}

/// Parse a promotions page into offers, in page order.
pub fn parse_promotions(html: &str) -> Result<Vec<PromotionOffer>> {
    Ok(PromotionParser::new()?.parse(html))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(title: &str, fineprint: &str) -> String {
        format!(
            r#"<div class="grid-parent">
                 <div class="greyBox"><img src="//media.example.test/promo.jpg"></div>
                 <div class="details">
                   <h3><strong>{title}</strong></h3>
                   <h6><strong>Run Dates: Jan 10 - Jan 20</strong></h6>
                   <h4><a href="/deals/trade">Learn more</a></h4>
                   <p class="fineprint">{fineprint}</p>
                 </div>
               </div>"#
        )
    }

    fn page(blocks: &[String]) -> String {
        format!("<html><body>{}</body></html>", blocks.join("\n"))
    }

    #[test]
    fn trade_offer_with_exclusion() {
        let html = page(&[block(
            "Get 15% extra towards PS5 games",
            "Valid on PS5 and PS4 trades.  15% extra, excludes PS4. In store only.",
        )]);
        let offers = parse_promotions(&html).unwrap();
        assert_eq!(offers.len(), 1);
        let o = &offers[0];
        assert_eq!(o.offer_type, Some(OfferType::Trade));
        assert_eq!(o.discount, Some(15));
        assert_eq!(o.discount_platforms, vec!["PS5".to_string()]);
        assert_eq!(o.image.as_deref(), Some("https://media.example.test/promo.jpg"));
        assert_eq!(o.run_dates.as_deref(), Some("Jan 10 - Jan 20"));
        assert_eq!(o.link.as_deref(), Some("/deals/trade"));
        assert!(o.in_store_only);
        assert_eq!(
            o.fineprint,
            "Valid on PS5 and PS4 trades. 15% extra, excludes PS4. In store only."
        );
    }

    #[test]
    fn discount_is_read_from_title_only() {
        let parser = PromotionParser::new().unwrap();
        let html = page(&[block("Bonus credit towards Switch games", "Get 20% extra on trades.")]);
        let offers = parser.parse(&html);
        assert_eq!(offers[0].offer_type, Some(OfferType::Trade));
        assert_eq!(offers[0].discount, None);
        assert_eq!(offers[0].discount_platforms, Vec::<String>::new());
    }

    #[test]
    fn save_wins_over_towards() {
        assert_eq!(
            OfferType::classify("Save 20% extra towards PS5 games"),
            Some(OfferType::Save)
        );
        let html = page(&[block("Save 20% extra towards PS5 games", "Valid on PS5.")]);
        let offers = parse_promotions(&html).unwrap();
        assert_eq!(offers[0].offer_type, Some(OfferType::Save));
        assert_eq!(offers[0].discount, None);
        assert!(offers[0].discount_platforms.is_empty());
    }

    #[test]
    fn platform_before_exclude_word_is_excluded() {
        let parser = PromotionParser::new().unwrap();
        assert_eq!(
            parser.discount_platforms("Valid on PS5. Trade-ins of PS4 games are excluded."),
            vec!["PS5".to_string()]
        );
        assert_eq!(
            parser.discount_platforms("Valid on PS5 and Xbox One, excludes PS4."),
            vec!["PS5".to_string(), "Xbox One".to_string()]
        );
        assert_eq!(
            parser.discount_platforms("Valid on Switch but excludes Xbox One games."),
            vec!["Switch".to_string()]
        );
    }

    #[test]
    fn absolute_image_src_is_kept() {
        let html = page(&[block("Save 5 on Switch", "Online.")
            .replace("//media.example.test/promo.jpg", "https://cdn.example.test/a.png")]);
        let offers = parse_promotions(&html).unwrap();
        assert_eq!(offers[0].image.as_deref(), Some("https://cdn.example.test/a.png"));
    }

    #[test]
    fn save_and_plain_offers_skip_trade_fields() {
        let html = page(&[
            block("Save $10 on select PS5 games", "Valid on PS5. 20% extra nowhere."),
            block("New arrivals", "Online only."),
        ]);
        let offers = parse_promotions(&html).unwrap();
        assert_eq!(offers[0].offer_type, Some(OfferType::Save));
        assert_eq!(offers[0].discount, None);
        assert!(offers[0].discount_platforms.is_empty());
        assert_eq!(offers[1].offer_type, None);
        assert!(!offers[1].in_store_only);
    }

    #[test]
    fn incomplete_blocks_are_skipped() {
        let no_image = r#"<div class="grid-parent"><div class="details"><h3><strong>Save big</strong></h3></div></div>"#;
        let no_details = r#"<div class="grid-parent"><div class="greyBox"><img src="//x/y.png"></div></div>"#;
        let html = page(&[
            no_image.to_string(),
            block("Save 5 on Switch", "Online."),
            no_details.to_string(),
        ]);
        let offers = parse_promotions(&html).unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].title, "Save 5 on Switch");
    }

    #[test]
    fn platform_tokens_dedupe_and_respect_sentence_order() {
        let parser = PromotionParser::new().unwrap();
        assert_eq!(
            parser.discount_platforms(
                "Applies to Nintendo Switch, Xbox One and PlayStation 5 games. Switch titles only. Xbox One games are excluded."
            ),
            vec!["Nintendo Switch".to_string(), "PlayStation 5".to_string()]
        );
        assert_eq!(
            parser.discount_platforms("Valid on XBox Series X/S. Offer excludes Playstation 4."),
            vec!["XBox Series X/S".to_string()]
        );
    }

    #[test]
    fn serializes_type_field_lowercase() {
        let html = page(&[block("Get 10% extra towards Xbox One", "Xbox One only.")]);
        let offers = parse_promotions(&html).unwrap();
        let v = serde_json::to_value(&offers[0]).unwrap();
        assert_eq!(v["type"], "trade");
        assert_eq!(v["discount"], 10);
        assert_eq!(v["discount_platforms"][0], "Xbox One");
    }
}
