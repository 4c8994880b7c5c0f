//! Builds view models for each generated page from loaded content.

use std::collections::BTreeMap;

use time::{Date, format_description::FormatItem, macros::format_description};

use crate::{
    application::{
        images::ImageProbe,
        markdown::RenderedMarkdown,
    },
    config::SiteSettings,
    domain::{
        experience::{Experience, ExperienceSummary},
        posts::{BlogPost, TagCount},
    },
    presentation::views::{
        BlogIndexView, CareerSummaryView, ExperienceTagView, ExperienceView, HeroImageView,
        HomeView, LinkView, PostCard, PostDetailView, ResumeView, SeriesEntryView, TagSummary,
        TestimonialView, TocEntry, build_tag_badges, rating_stars, tag_path,
    },
    util::{
        date::{
            DateStyle, calculate_age, calculate_duration, format_date, format_month_year,
            relative_time,
        },
        reading_time::calculate_detailed_reading_time,
        sanitize::{sanitize_text, sanitize_url},
    },
};

const ISO_DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Posts shown on the home page.
pub const RECENT_POST_LIMIT: usize = 3;

pub(crate) fn iso_date(date: Date) -> String {
    date.format(ISO_DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

/// Site-relative paths pass through; anything else must be an http(s) URL.
pub(crate) fn safe_href(href: &str) -> String {
    let href = href.trim();
    if href.starts_with('/') && !href.starts_with("//") {
        href.to_string()
    } else {
        sanitize_url(href)
    }
}

/// Frontmatter override wins over the estimate from the body.
pub(crate) fn reading_time_label(post: &BlogPost) -> (String, usize) {
    let estimate = calculate_detailed_reading_time(&post.body);
    let words = usize::try_from(estimate.words).unwrap_or(usize::MAX);
    match post.frontmatter.reading_time {
        Some(minutes) => (format!("{minutes} min read"), words),
        None => (estimate.text, words),
    }
}

pub(crate) fn post_card(post: &BlogPost, today: Date, site_host: &str) -> PostCard {
    let published = post.pub_date();
    let (reading_time, _) = reading_time_label(post);
    PostCard {
        title: post.title().to_string(),
        link: LinkView::new(post.title(), safe_href(&post.link()), site_host),
        excerpt: post
            .frontmatter
            .description
            .as_deref()
            .map(sanitize_text)
            .filter(|text| !text.is_empty()),
        iso_date: iso_date(published),
        published: format_date(published, DateStyle::Long),
        relative: relative_time(published, today),
        reading_time,
        badges: build_tag_badges(&post.frontmatter.tags),
        external_site: post
            .frontmatter
            .external
            .as_ref()
            .map(|external| external.site.clone()),
        is_featured: post.frontmatter.featured,
    }
}

pub(crate) fn career_summary(experiences: &[Experience], today: Date) -> CareerSummaryView {
    let summary = ExperienceSummary::compute(experiences, today);
    CareerSummaryView {
        years: summary.years,
        progress: format!("{:.1}%", summary.progress_to_next_year),
        progress_percent: summary.progress_to_next_year,
        current_role: summary.current_role,
        technologies: summary.technologies,
    }
}

pub(crate) fn home_view(
    site: &SiteSettings,
    posts: &[&BlogPost],
    experiences: &[Experience],
    today: Date,
) -> HomeView {
    let host = site.host();
    HomeView {
        name: site.author.clone(),
        job_title: site.job_title.clone(),
        location: site.location.clone(),
        age: site.birth_date.map(|birth| calculate_age(birth, today)),
        description: site.description.clone(),
        career: career_summary(experiences, today),
        recent_posts: posts
            .iter()
            .take(RECENT_POST_LIMIT)
            .map(|post| post_card(post, today, &host))
            .collect(),
    }
}

/// Listing of `posts`; `active_tag` is a tag slug that narrows the listing.
pub(crate) fn blog_index_view(
    site: &SiteSettings,
    posts: &[&BlogPost],
    tag_counts: &BTreeMap<String, TagCount>,
    active_tag: Option<&str>,
    today: Date,
) -> BlogIndexView {
    let host = site.host();
    let cards: Vec<PostCard> = posts
        .iter()
        .filter(|post| match active_tag {
            Some(slug) => post
                .frontmatter
                .tags
                .iter()
                .any(|candidate| slug::slugify(candidate) == slug),
            None => true,
        })
        .map(|post| post_card(post, today, &host))
        .collect();

    let heading = match active_tag {
        Some(slug) => {
            let label = tag_counts.get(slug).map_or(slug, |tag| tag.label.as_str());
            format!("Posts tagged #{label}")
        }
        None => "Blog".to_string(),
    };

    BlogIndexView {
        heading,
        has_results: !cards.is_empty(),
        posts: cards,
        tags: tag_counts
            .iter()
            .map(|(slug, tag)| TagSummary {
                label: tag.label.clone(),
                href: tag_path(slug),
                count: tag.count,
                is_active: active_tag == Some(slug.as_str()),
            })
            .collect(),
    }
}

pub(crate) fn post_detail_view(
    post: &BlogPost,
    rendered: RenderedMarkdown,
    series_posts: Vec<SeriesEntryView>,
    images: &ImageProbe,
) -> PostDetailView {
    let (reading_time, word_count) = reading_time_label(post);
    let hero = post.frontmatter.hero_image.as_ref().map(|image| {
        let dimensions = images.dimensions(&image.src);
        HeroImageView {
            src: safe_href(&image.src),
            alt: image.alt.clone(),
            caption: image.caption.clone(),
            width: dimensions.map(|dims| dims.width.get()),
            height: dimensions.map(|dims| dims.height.get()),
        }
    });

    PostDetailView {
        title: post.title().to_string(),
        author: post.author.clone(),
        published: format_date(post.pub_date(), DateStyle::Long),
        iso_date: iso_date(post.pub_date()),
        updated: post
            .frontmatter
            .last_modified
            .filter(|modified| *modified > post.pub_date())
            .map(|modified| format_date(modified, DateStyle::Long)),
        reading_time,
        word_count,
        difficulty: post.frontmatter.difficulty.map(|level| level.label()),
        series: post.frontmatter.series.clone(),
        series_posts,
        tags: build_tag_badges(&post.frontmatter.tags),
        hero,
        toc: rendered
            .toc()
            .map(|heading| TocEntry {
                anchor: heading.anchor.clone(),
                title: heading.text.clone(),
                level: heading.level,
            })
            .collect(),
        has_code_blocks: rendered.contains_code,
        body_html: rendered.html,
    }
}

/// Local posts sharing `post`'s series, ordered by `seriesOrder` then date.
pub(crate) fn series_entries(post: &BlogPost, posts: &[&BlogPost]) -> Vec<SeriesEntryView> {
    let Some(series) = post.frontmatter.series.as_deref() else {
        return Vec::new();
    };

    let mut members: Vec<&BlogPost> = posts
        .iter()
        .copied()
        .filter(|candidate| {
            candidate.frontmatter.series.as_deref() == Some(series)
                && candidate.external_url().is_none()
        })
        .collect();
    members.sort_by(|a, b| {
        a.frontmatter
            .series_order
            .unwrap_or(u32::MAX)
            .cmp(&b.frontmatter.series_order.unwrap_or(u32::MAX))
            .then_with(|| a.pub_date().cmp(&b.pub_date()))
    });

    members
        .into_iter()
        .map(|member| SeriesEntryView {
            title: member.title().to_string(),
            href: member.path(),
            is_current: member.slug == post.slug,
        })
        .collect()
}

pub(crate) fn resume_view(
    site: &SiteSettings,
    experiences: &[Experience],
    today: Date,
) -> ResumeView {
    let host = site.host();
    let mut ordered: Vec<&Experience> = experiences.iter().collect();
    ordered.sort_by(|a, b| {
        b.is_current()
            .cmp(&a.is_current())
            .then_with(|| b.start.cmp(&a.start))
    });

    ResumeView {
        name: site.author.clone(),
        job_title: site.job_title.clone(),
        career: career_summary(experiences, today),
        experiences: ordered
            .into_iter()
            .map(|experience| experience_view(experience, today, &host))
            .collect(),
    }
}

fn experience_view(experience: &Experience, today: Date, site_host: &str) -> ExperienceView {
    let start = format_month_year(experience.start, DateStyle::Short);
    let end = experience
        .end
        .map(|end| format_month_year(end, DateStyle::Short))
        .unwrap_or_else(|| "Present".to_string());

    ExperienceView {
        id: experience.id.clone(),
        title: experience.title.clone(),
        company: experience.company.clone(),
        period: format!("{start} - {end}"),
        duration: calculate_duration(experience.start, experience.end, today),
        location: experience.location.label(),
        is_current: experience.is_current(),
        tags: experience
            .tags
            .iter()
            .map(|tag| ExperienceTagView {
                label: tag.label.clone(),
                color: tag.color_type.as_str(),
            })
            .collect(),
        description: experience.description.clone(),
        technologies: experience.technologies.clone(),
        achievements: experience.achievements.clone(),
        website: experience
            .website
            .as_deref()
            .map(|href| LinkView::new(&experience.company, sanitize_url(href), site_host)),
        logo: experience.logo.as_deref().map(safe_href),
        testimonial: experience.testimonial.as_ref().map(|testimonial| TestimonialView {
            quote: testimonial.quote.clone(),
            author: testimonial.author.clone(),
            title: testimonial.title.clone(),
            company: testimonial.company.clone(),
            date: testimonial
                .date
                .map(|date| format_month_year(date, DateStyle::Long)),
            stars: testimonial.rating.map(rating_stars).unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;
    use crate::domain::posts::Frontmatter;

    fn post(slug: &str, series: Option<(&str, u32)>, external: bool) -> BlogPost {
        let yaml = format!(
            "title: {slug}\npubDate: 2024-01-0{}\n{}{}",
            slug.len().min(9),
            series
                .map(|(name, order)| format!("series: {name}\nseriesOrder: {order}\n"))
                .unwrap_or_default(),
            if external {
                "external:\n  url: https://dev.to/x\n  site: dev.to\n"
            } else {
                ""
            },
        );
        let frontmatter: Frontmatter = serde_yaml_ng::from_str(&yaml).expect("frontmatter");
        BlogPost {
            slug: slug.to_string(),
            author: "Jane".to_string(),
            frontmatter,
            body: "word ".repeat(450),
        }
    }

    #[test]
    fn series_entries_follow_series_order_and_skip_external() {
        let first = post("a", Some(("rust", 2)), false);
        let second = post("bb", Some(("rust", 1)), false);
        let external = post("ccc", Some(("rust", 3)), true);
        let other = post("dddd", None, false);
        let posts = vec![&first, &second, &external, &other];

        let entries = series_entries(&first, &posts);
        let titles: Vec<&str> = entries.iter().map(|entry| entry.title.as_str()).collect();
        assert_eq!(titles, vec!["bb", "a"]);
        assert!(entries[1].is_current);
        assert!(series_entries(&other, &posts).is_empty());
    }

    #[test]
    fn post_cards_link_external_posts_out() {
        let external = post("ext", None, true);
        let card = post_card(&external, date!(2024 - 01 - 10), "jane.dev");
        assert_eq!(card.link.href, "https://dev.to/x");
        assert_eq!(card.link.target.as_deref(), Some("_blank"));
        assert_eq!(card.external_site.as_deref(), Some("dev.to"));
        assert_eq!(card.reading_time, "3 min read");
    }

    #[test]
    fn safe_href_keeps_site_paths_only() {
        assert_eq!(safe_href("/images/hero.png"), "/images/hero.png");
        assert_eq!(safe_href("//evil.example/x"), "#");
        assert_eq!(safe_href("javascript:alert(1)"), "#");
        assert_eq!(safe_href("https://dev.to/x"), "https://dev.to/x");
    }

    #[test]
    fn reading_time_override_wins() {
        let mut local = post("local", None, false);
        local.frontmatter.reading_time = Some(12);
        let (label, words) = reading_time_label(&local);
        assert_eq!(label, "12 min read");
        assert_eq!(words, 450);
    }
}
