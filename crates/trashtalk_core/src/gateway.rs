//! crates/trashtalk_core/src/gateway.rs
//!
//! The Content Generation Gateway: composes the prompt for a tone preset,
//! calls the upstream generation service with a hard timeout, and substitutes
//! canned fallback content on any failure so the caller always receives text.

const SYSTEM_PROMPT: &str = r#"You are an extremely online, ironic shitposter who thrives on absurdity, memes, pop culture, and chaos. Your job is to generate short, punchy, hilarious tweets that are intentionally weird, sarcastic, edgy (but not offensive), and extremely relatable or unrelatable in a funny way.

Tone:
- Ironic, Gen Z humor
- Self-deprecating or hyper-confident
- Often uses meme formats or unexpected punchlines

Formatting Rules:
- Limit to 280 characters
- Can include line breaks for comedic timing
- No hashtags, no emojis unless used ironically
- Use lowercase for casual tone, ALL CAPS for dramatic effect

Avoid:
- Anything hateful, political, NSFW, or triggering
- Slurs, targeted jokes, or real people/events unless universally understood memes

Output Format:
- One tweet per output
- No explanations
- Keep it weird, keep it stupid, keep it funny"#;

/// The canned posts served whenever the upstream call fails. Small on
/// purpose; these are a degraded mode, not a content library.
const FALLBACK_POSTS: &[&str] = &[
    "me: i should sleep\nalso me: researching if penguins have knees",
    "normalize saying 'that's above my pay grade' when someone asks what 2+2 equals",
    "my toxic trait is thinking I can finish a project in one day that actually takes six months",
    "every day i wake up and choose violence. then i snooze my alarm and go back to sleep.",
    "job interview question: 'how do you handle stress?'\nme: poorly",
];

const FALLBACK_MESSAGE: &str = "API temporarily unavailable, but chaos continues!";

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::domain::{GeneratedPost, Tone};
use crate::ports::ContentGenerationService;

fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::GenZ => {
            "Generate a tweet with Gen Z Burnout humor. Use lowercase, internet slang, and existential dread mixed with humor."
        }
        Tone::TechBro => {
            "Generate a tweet in Tech Bro Manifesto style. Reference hustle culture, startups, crypto, or productivity hacks in an ironic way."
        }
        Tone::Corporate => {
            "Generate a tweet with Corporate Cringe humor. Use corporate buzzwords and jargon in an absurd, satirical way."
        }
        Tone::Absurdist => {
            "Generate a tweet with Absurdist Nihilism humor. Make it weird, random, and philosophical in a funny way."
        }
        Tone::Anime => {
            "Generate a tweet as an Anime Lord. Reference anime tropes and culture in an over-the-top, self-aware way."
        }
    }
}

/// Builds the composite prompt: fixed system framing, tone instruction, and
/// an optional user focus clause.
fn compose_prompt(tone: Tone, custom_prompt: Option<&str>) -> String {
    let mut prompt = format!("{}\n\n{}", SYSTEM_PROMPT, tone_instruction(tone));
    if let Some(focus) = custom_prompt.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(&format!("\n\nMake the tweet specifically {}.", focus));
    }
    prompt
}

/// Wraps the upstream generation service with prompt composition, a hard
/// timeout and the fallback content path.
pub struct ContentGateway {
    upstream: Arc<dyn ContentGenerationService>,
    timeout: Duration,
    pick_fallback: fn(usize) -> usize,
}

impl ContentGateway {
    /// Default hard timeout on the upstream call.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(upstream: Arc<dyn ContentGenerationService>, timeout: Duration) -> Self {
        Self {
            upstream,
            timeout,
            pick_fallback: |len| {
                use rand::Rng;
                rand::thread_rng().gen_range(0..len)
            },
        }
    }

    /// Like `new`, but with an injected fallback picker so tests can pin
    /// which canned post is selected.
    pub fn with_fallback_picker(
        upstream: Arc<dyn ContentGenerationService>,
        timeout: Duration,
        pick_fallback: fn(usize) -> usize,
    ) -> Self {
        Self {
            upstream,
            timeout,
            pick_fallback,
        }
    }

    /// Generates one post for the given tone. Never fails and never returns
    /// empty text: any upstream problem (timeout, error, empty body) yields
    /// a flagged fallback post instead.
    pub async fn generate(&self, tone: Tone, custom_prompt: Option<&str>) -> GeneratedPost {
        let prompt = compose_prompt(tone, custom_prompt);

        // `timeout` drops the upstream future on expiry, cancelling the call.
        let outcome = tokio::time::timeout(self.timeout, self.upstream.complete(&prompt)).await;

        match outcome {
            Ok(Ok(text)) if !text.trim().is_empty() => GeneratedPost {
                text: text.trim().to_string(),
                fallback_used: false,
                fallback_message: None,
            },
            Ok(Ok(_)) => {
                warn!("Upstream returned empty text for tone '{}'", tone.as_str());
                self.fallback_post()
            }
            Ok(Err(e)) => {
                warn!("Upstream generation failed for tone '{}': {}", tone.as_str(), e);
                self.fallback_post()
            }
            Err(_) => {
                warn!(
                    "Upstream generation timed out after {:?} for tone '{}'",
                    self.timeout,
                    tone.as_str()
                );
                self.fallback_post()
            }
        }
    }

    fn fallback_post(&self) -> GeneratedPost {
        let index = (self.pick_fallback)(FALLBACK_POSTS.len()) % FALLBACK_POSTS.len();
        GeneratedPost {
            text: FALLBACK_POSTS[index].to_string(),
            fallback_used: true,
            fallback_message: Some(FALLBACK_MESSAGE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;

    enum UpstreamScript {
        Reply(String),
        Fail,
        Hang,
    }

    struct ScriptedUpstream {
        script: UpstreamScript,
    }

    #[async_trait]
    impl ContentGenerationService for ScriptedUpstream {
        async fn complete(&self, _prompt: &str) -> PortResult<String> {
            match &self.script {
                UpstreamScript::Reply(text) => Ok(text.clone()),
                UpstreamScript::Fail => Err(PortError::Upstream("model exploded".into())),
                UpstreamScript::Hang => {
                    futures::future::pending::<()>().await;
                    unreachable!()
                }
            }
        }
    }

    fn gateway(script: UpstreamScript) -> ContentGateway {
        ContentGateway::with_fallback_picker(
            Arc::new(ScriptedUpstream { script }),
            Duration::from_secs(10),
            |_| 0,
        )
    }

    #[tokio::test]
    async fn successful_generation_is_not_flagged_as_fallback() {
        let gateway = gateway(UpstreamScript::Reply("me when the chaos hits".into()));
        let post = gateway.generate(Tone::GenZ, None).await;
        assert_eq!(post.text, "me when the chaos hits");
        assert!(!post.fallback_used);
        assert!(post.fallback_message.is_none());
    }

    #[tokio::test]
    async fn upstream_failure_yields_flagged_fallback() {
        let gateway = gateway(UpstreamScript::Fail);
        let post = gateway.generate(Tone::Corporate, None).await;
        assert!(post.fallback_used);
        assert!(post.fallback_message.is_some());
        assert!(FALLBACK_POSTS.contains(&post.text.as_str()));
    }

    #[tokio::test]
    async fn empty_upstream_text_is_treated_as_failure() {
        let gateway = gateway(UpstreamScript::Reply("   \n ".into()));
        let post = gateway.generate(Tone::Absurdist, None).await;
        assert!(post.fallback_used);
        assert!(!post.text.trim().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn upstream_hang_is_cut_off_by_the_timeout() {
        let gateway = gateway(UpstreamScript::Hang);
        let post = gateway.generate(Tone::Anime, None).await;
        assert!(post.fallback_used);
        assert!(FALLBACK_POSTS.contains(&post.text.as_str()));
    }

    #[tokio::test]
    async fn generation_never_returns_empty_text() {
        for script in [
            UpstreamScript::Reply("real post".into()),
            UpstreamScript::Reply("".into()),
            UpstreamScript::Fail,
        ] {
            let post = gateway(script).generate(Tone::TechBro, None).await;
            assert!(!post.text.trim().is_empty());
        }
    }

    #[test]
    fn custom_prompt_is_appended_as_a_focus_clause() {
        let prompt = compose_prompt(Tone::GenZ, Some("about cats"));
        assert!(prompt.contains("Gen Z Burnout"));
        assert!(prompt.ends_with("Make the tweet specifically about cats."));

        let bare = compose_prompt(Tone::GenZ, Some("   "));
        assert!(!bare.contains("specifically"));
    }

    #[test]
    fn tone_parsing_covers_the_closed_set() {
        assert_eq!(Tone::parse("gen-z"), Some(Tone::GenZ));
        assert_eq!(Tone::parse("tech-bro"), Some(Tone::TechBro));
        assert_eq!(Tone::parse("corporate"), Some(Tone::Corporate));
        assert_eq!(Tone::parse("absurdist"), Some(Tone::Absurdist));
        assert_eq!(Tone::parse("anime"), Some(Tone::Anime));
        assert_eq!(Tone::parse("sincere"), None);
    }
}
