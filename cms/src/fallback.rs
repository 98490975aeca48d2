//! Static content served when the CMS cannot be reached.
//!
//! The dataset is already in canonical form, so callers cannot tell it
//! apart from normalized live data except through the gateway's status.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::OnceLock;
use tracing::debug;

use crate::provider::{CmsResult, ContentProvider};
use crate::types::{
    Article, Card, CollectionResult, ContentOrigin, Entity, EntityMeta, Organization, Page,
    Pagination, RichText,
};

/// Page size reported for `get_all`, matching the backend default.
pub const FALLBACK_PAGE_SIZE: u32 = 25;

#[derive(Debug)]
pub struct Dataset {
    pub articles: Vec<Article>,
    pub organizations: Vec<Organization>,
    pub pages: Vec<Page>,
    pub cards: Vec<Card>,
}

/// Built on first use, never mutated afterwards.
pub fn dataset() -> &'static Dataset {
    static DATASET: OnceLock<Dataset> = OnceLock::new();
    DATASET.get_or_init(build_dataset)
}

/// Entity types with a slice in the fallback dataset.
pub trait FallbackEntity: Entity {
    fn records(dataset: &'static Dataset) -> &'static [Self];
}

impl FallbackEntity for Article {
    fn records(dataset: &'static Dataset) -> &'static [Self] {
        &dataset.articles
    }
}

impl FallbackEntity for Organization {
    fn records(dataset: &'static Dataset) -> &'static [Self] {
        &dataset.organizations
    }
}

impl FallbackEntity for Page {
    fn records(dataset: &'static Dataset) -> &'static [Self] {
        &dataset.pages
    }
}

impl FallbackEntity for Card {
    fn records(dataset: &'static Dataset) -> &'static [Self] {
        &dataset.cards
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackProvider;

impl FallbackProvider {
    pub fn new() -> Self {
        Self
    }

    fn sorted<E: FallbackEntity>() -> Vec<E> {
        let mut records = E::records(dataset()).to_vec();
        records.sort_by(|a, b| a.default_order(b));
        records
    }
}

#[async_trait]
impl<E: FallbackEntity> ContentProvider<E> for FallbackProvider {
    async fn get_all(&self) -> CmsResult<CollectionResult<E>> {
        let records = Self::sorted::<E>();
        let total = u32::try_from(records.len()).unwrap_or(u32::MAX);
        let data = records
            .into_iter()
            .take(FALLBACK_PAGE_SIZE as usize)
            .collect();

        debug!("Serving fallback {}", E::COLLECTION);
        Ok(CollectionResult::new(
            data,
            Pagination::new(1, FALLBACK_PAGE_SIZE, total),
        ))
    }

    async fn get_featured(&self, limit: u32) -> CmsResult<CollectionResult<E>> {
        let featured: Vec<E> = Self::sorted::<E>()
            .into_iter()
            .filter(|record| record.is_featured())
            .collect();
        let total = u32::try_from(featured.len()).unwrap_or(u32::MAX);
        let data = featured.into_iter().take(limit as usize).collect();

        debug!("Serving fallback featured {} (limit {})", E::COLLECTION, limit);
        Ok(CollectionResult::new(data, Pagination::new(1, limit, total)))
    }

    async fn get_by_slug(&self, slug: &str) -> CmsResult<Option<E>> {
        Ok(E::records(dataset())
            .iter()
            .find(|record| record.slug() == Some(slug))
            .cloned())
    }

    fn provider_name(&self) -> &'static str {
        "fallback"
    }
}

fn date(year: i32, month: u32, day: u32) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
}

fn meta(id: i64, published: Option<DateTime<Utc>>) -> EntityMeta {
    EntityMeta {
        id,
        document_id: None,
        created_at: published,
        updated_at: published,
        published_at: published,
    }
}

fn build_dataset() -> Dataset {
    Dataset {
        articles: articles(),
        organizations: organizations(),
        pages: pages(),
        cards: cards(),
    }
}

fn articles() -> Vec<Article> {
    vec![
        Article {
            meta: meta(1, date(2024, 12, 1)),
            title: "Understanding Childhood Cancer".to_string(),
            content: RichText::plain(
                "<p>This is a comprehensive guide to understanding childhood cancer...</p>",
            ),
            excerpt: Some(
                "A comprehensive guide covering the basics of childhood cancer, treatment \
                 options, and support resources."
                    .to_string(),
            ),
            slug: "understanding-childhood-cancer".to_string(),
            author: "Dr. Sarah Johnson".to_string(),
            featured: true,
            provider: ContentOrigin::Internal,
            external_link: None,
            featured_image: None,
        },
        Article {
            meta: meta(2, date(2024, 11, 28)),
            title: "Latest Research Developments".to_string(),
            content: RichText::plain(
                "<p>Recent breakthroughs in childhood cancer research...</p>",
            ),
            excerpt: Some(
                "Discover the latest research developments and breakthrough treatments in \
                 pediatric oncology."
                    .to_string(),
            ),
            slug: "latest-research-developments".to_string(),
            author: "Research Team".to_string(),
            featured: false,
            provider: ContentOrigin::External,
            external_link: Some("https://example.com/research".to_string()),
            featured_image: None,
        },
        Article {
            meta: meta(3, date(2024, 11, 20)),
            title: "Supporting Siblings Through Treatment".to_string(),
            content: RichText::paragraphs([
                "Brothers and sisters often feel left out while a child is in treatment.",
                "Simple routines and honest conversations help them feel included.",
            ]),
            excerpt: None,
            slug: "supporting-siblings-through-treatment".to_string(),
            author: "Family Support Team".to_string(),
            featured: true,
            provider: ContentOrigin::Internal,
            external_link: None,
            featured_image: None,
        },
        Article {
            meta: meta(4, date(2024, 11, 10)),
            title: "Nutrition During Chemotherapy".to_string(),
            content: RichText::paragraphs([
                "Appetite changes are common during chemotherapy.",
                "Small, frequent meals are often easier to manage.",
            ]),
            excerpt: Some("Practical eating tips for children undergoing chemotherapy.".to_string()),
            slug: "nutrition-during-chemotherapy".to_string(),
            author: "Clinical Dietitians".to_string(),
            featured: false,
            provider: ContentOrigin::Internal,
            external_link: None,
            featured_image: None,
        },
        Article {
            meta: meta(5, date(2024, 10, 30)),
            title: "Returning to School After Treatment".to_string(),
            content: RichText::plain(
                "<p>Going back to school is a milestone worth planning for...</p>",
            ),
            excerpt: Some(
                "How families and teachers can prepare for a child's return to the classroom."
                    .to_string(),
            ),
            slug: "returning-to-school-after-treatment".to_string(),
            author: "Education Liaison".to_string(),
            featured: false,
            provider: ContentOrigin::Internal,
            external_link: None,
            featured_image: None,
        },
    ]
}

fn organizations() -> Vec<Organization> {
    vec![
        Organization {
            meta: meta(1, date(2024, 12, 1)),
            name: "Children's Cancer Foundation".to_string(),
            description: RichText::plain(
                "<p>A leading organization dedicated to supporting children with cancer and \
                 their families.</p>",
            ),
            website: "https://childrenscancer.org".to_string(),
            email: Some("info@childrenscancer.org".to_string()),
            phone: Some("+1-800-123-4567".to_string()),
            logo: None,
            featured: true,
        },
        Organization {
            meta: meta(2, date(2024, 12, 1)),
            name: "Pediatric Oncology Support Group".to_string(),
            description: RichText::plain(
                "<p>Providing emotional support and resources for families affected by \
                 childhood cancer.</p>",
            ),
            website: "https://pediatricsupport.org".to_string(),
            email: Some("support@pediatricsupport.org".to_string()),
            phone: None,
            logo: None,
            featured: false,
        },
    ]
}

fn pages() -> Vec<Page> {
    vec![
        Page {
            meta: meta(1, date(2024, 12, 1)),
            title: "About Us".to_string(),
            slug: "about".to_string(),
            content: RichText::plain(
                "<p>We are dedicated to supporting children with cancer and their families...</p>",
            ),
            meta_title: Some("About Us - Childhood Cancer Support".to_string()),
            meta_description: Some(
                "Learn about our mission to support children with cancer and their families."
                    .to_string(),
            ),
            featured_image: None,
        },
        Page {
            meta: meta(2, date(2024, 12, 1)),
            title: "Our Story".to_string(),
            slug: "story".to_string(),
            content: RichText::plain("<p>Our journey began when...</p>"),
            meta_title: Some("Our Story - How We Started".to_string()),
            meta_description: Some(
                "Discover the story behind our organization and our mission.".to_string(),
            ),
            featured_image: None,
        },
    ]
}

fn cards() -> Vec<Card> {
    vec![
        Card {
            id: 1,
            title: "Find Support".to_string(),
            content: RichText::plain("Connect with organizations that help families every day."),
            icon: Some("heart".to_string()),
            bg_color: None,
            text_color: None,
            button_text: Some("Browse organizations".to_string()),
            button_link: Some("/organizations".to_string()),
            featured: true,
        },
        Card {
            id: 2,
            title: "Read the Latest".to_string(),
            content: RichText::paragraphs(["Guides, research news and stories from families."]),
            icon: Some("book".to_string()),
            bg_color: Some("bg-emerald-600".to_string()),
            text_color: Some("text-white".to_string()),
            button_text: Some("Read articles".to_string()),
            button_link: Some("/articles".to_string()),
            featured: false,
        },
        Card {
            id: 3,
            title: "Get Involved".to_string(),
            content: RichText::plain("Volunteer, fundraise or share your own experience."),
            icon: None,
            bg_color: Some("bg-amber-500".to_string()),
            text_color: None,
            button_text: None,
            button_link: None,
            featured: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn slugs<E: Entity>(records: &[E]) -> Vec<&str> {
        records.iter().filter_map(|record| record.slug()).collect()
    }

    #[test]
    fn test_dataset_invariants() {
        let data = dataset();
        assert_eq!(data.articles.len(), 5);
        assert_eq!(data.articles.iter().filter(|a| a.featured).count(), 2);

        let article_slugs = slugs(&data.articles);
        assert_eq!(
            article_slugs.iter().collect::<HashSet<_>>().len(),
            article_slugs.len()
        );
        let page_slugs = slugs(&data.pages);
        assert_eq!(page_slugs.iter().collect::<HashSet<_>>().len(), page_slugs.len());

        for article in &data.articles {
            assert!(!article.title.is_empty());
            if article.is_external() {
                assert!(article.external_link.is_some());
            }
        }

        assert!(std::ptr::eq(dataset(), data));
    }

    #[tokio::test]
    async fn test_featured_articles_sorted_newest_first() {
        let provider = FallbackProvider::new();
        let featured: CollectionResult<Article> = provider.get_featured(3).await.unwrap();

        let ids: Vec<i64> = featured.data.iter().map(|a| a.meta.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(featured.pagination, Pagination::new(1, 3, 2));
        assert!(featured.len() <= featured.pagination.page_size as usize);
    }

    #[tokio::test]
    async fn test_featured_truncates_to_limit() {
        let provider = FallbackProvider::new();
        let featured: CollectionResult<Article> = provider.get_featured(1).await.unwrap();
        assert_eq!(featured.len(), 1);
        assert_eq!(featured.data[0].slug, "understanding-childhood-cancer");
        assert_eq!(featured.pagination.total, 2);
        assert_eq!(featured.pagination.page_count, 2);

        let none: CollectionResult<Article> = provider.get_featured(0).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_get_all_is_stable_and_paginated() {
        let provider = FallbackProvider::new();
        let first: CollectionResult<Organization> = provider.get_all().await.unwrap();
        let second: CollectionResult<Organization> = provider.get_all().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.pagination, Pagination::new(1, FALLBACK_PAGE_SIZE, 2));
        assert_eq!(first.data[0].name, "Children's Cancer Foundation");

        let articles: CollectionResult<Article> = provider.get_all().await.unwrap();
        let dates: Vec<_> = articles.data.iter().map(|a| a.meta.published_at).collect();
        let mut sorted = dates.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, sorted);
    }

    #[tokio::test]
    async fn test_get_by_slug_is_exact() {
        let provider = FallbackProvider::new();

        let page: Option<Page> = provider.get_by_slug("about").await.unwrap();
        assert_eq!(page.unwrap().title, "About Us");

        let upper: Option<Page> = provider.get_by_slug("About").await.unwrap();
        assert!(upper.is_none());

        let missing: Option<Article> = provider.get_by_slug("nonexistent").await.unwrap();
        assert!(missing.is_none());

        let org: Option<Organization> = provider.get_by_slug("about").await.unwrap();
        assert!(org.is_none());
    }

    #[tokio::test]
    async fn test_cards_available() {
        let provider = FallbackProvider::new();
        let cards: CollectionResult<Card> = provider.get_all().await.unwrap();
        assert_eq!(cards.len(), 3);
        assert_eq!(
            cards.data[0].button(),
            Some(("Browse organizations", "/organizations"))
        );
        assert_eq!(
            <FallbackProvider as ContentProvider<Card>>::provider_name(&provider),
            "fallback"
        );
    }
}
