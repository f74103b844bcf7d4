use std::{path::Path, sync::Arc, thread::sleep, time::{Duration, Instant}};

use compact_str::CompactString;
use headless_chrome::{Tab, protocol::cdp::Page::CaptureScreenshotFormatOption};
use regex::Regex;
use tokio::sync::mpsc::{UnboundedReceiver, error::TryRecvError};

use chs::config::{self, Credentials};

use crate::browser;

const HOME_URL: &str = "https://charts.spotify.com/home";
const LOGIN_LINK: &str = "a[data-testid=\"charts-login\"]";
const USERNAME_INPUT: &str = "input[data-testid=\"login-username\"]";
const PASSWORD_INPUT: &str = "input[data-testid=\"login-password\"]";
const LOGIN_BUTTON: &str = "button[data-testid=\"login-button\"]";
const CHALLENGE_HOST: &str = "challenge.spotify.com";
const PASSWORD_FALLBACK_TEXT: &str = "Log in with a password";

const LOGIN_URL_PATTERN: &str = r"^https://accounts\.spotify\.com/.*/login";
const OVERVIEW_URL_PATTERN: &str = r"^https://charts\.spotify\.com/charts/overview/global";

const LOGIN_URL_TIMEOUT: Duration = Duration::from_secs(10);
const CHALLENGE_SETTLE: Duration = Duration::from_secs(4);
const CHALLENGE_BUTTON_TIMEOUT: Duration = Duration::from_secs(5);
const PASSWORD_FIELD_TIMEOUT: Duration = Duration::from_secs(5);
const REDIRECT_TIMEOUT: Duration = Duration::from_secs(15);
const POST_LOGIN_SETTLE: Duration = Duration::from_secs(1);

/// What a capture run can end in. Only `Token` carries a credential;
/// `NoRequestObserved` means login worked but the observer never fired,
/// which callers report instead of treating as success.
#[derive(Debug)]
pub enum CaptureOutcome {
    Token(CompactString),
    NoRequestObserved,
    LoginTimeout,
    FlowUnrecognized,
    BrowserError(anyhow::Error),
}

#[derive(Debug)]
pub enum FlowError {
    Timeout(&'static str),
    Unrecognized(&'static str),
    Browser(anyhow::Error),
}

/// Everything the login flow needs from a page. The real implementation
/// drives a devtools tab; tests script one.
pub trait Page {
    fn goto(&self, url: &str) -> anyhow::Result<()>;
    fn click(&self, css: &str) -> anyhow::Result<()>;
    fn fill(&self, css: &str, value: &str) -> anyhow::Result<()>;
    fn is_present(&self, css: &str) -> bool;
    fn wait_for_css(&self, css: &str, timeout: Duration) -> bool;
    fn click_button_with_text(&self, text: &str, timeout: Duration) -> anyhow::Result<bool>;
    fn wait_for_url(&self, pattern: &Regex, timeout: Duration) -> bool;
    fn url(&self) -> String;
    fn pause(&self, duration: Duration);
    fn screenshot(&self, file: &str);
}

/// Login proceeds Start -> TriggerLogin -> InspectForm -> (Challenge ->)
/// AwaitRedirect -> Done, or stops at the first transition that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    TriggerLogin,
    InspectForm,
    Challenge,
    AwaitRedirect,
    Done,
}

pub fn step<P: Page>(
    page: &P,
    creds: &Credentials,
    state: LoginState,
) -> Result<LoginState, FlowError> {
    let login_url = Regex::new(LOGIN_URL_PATTERN).unwrap();

    match state {
        LoginState::Start => {
            tracing::info!(target: "token", "opening charts homepage ...");
            page.goto(HOME_URL).map_err(FlowError::Browser)?;
            Ok(LoginState::TriggerLogin)
        }

        LoginState::TriggerLogin => {
            tracing::info!(target: "token", "clicking login button ...");
            page.click(LOGIN_LINK).map_err(FlowError::Browser)?;
            if page.wait_for_url(&login_url, LOGIN_URL_TIMEOUT) {
                Ok(LoginState::InspectForm)
            } else {
                Err(FlowError::Timeout("identity provider login page"))
            }
        }

        LoginState::InspectForm => {
            let has_email = page.is_present(USERNAME_INPUT);
            let has_password = page.is_present(PASSWORD_INPUT);

            if has_email && has_password {
                tracing::info!(target: "token", "email+password form detected");
                page.fill(USERNAME_INPUT, &creds.username).map_err(FlowError::Browser)?;
                page.fill(PASSWORD_INPUT, &creds.password).map_err(FlowError::Browser)?;
                page.click(LOGIN_BUTTON).map_err(FlowError::Browser)?;
                Ok(LoginState::AwaitRedirect)
            } else if has_email {
                tracing::info!(target: "token", "email-only form detected, entering email ...");
                page.fill(USERNAME_INPUT, &creds.username).map_err(FlowError::Browser)?;
                page.click(LOGIN_BUTTON).map_err(FlowError::Browser)?;
                page.pause(CHALLENGE_SETTLE);

                if page.url().contains(CHALLENGE_HOST) {
                    Ok(LoginState::Challenge)
                } else {
                    page.screenshot("no_challenge_page.png");
                    Err(FlowError::Unrecognized("challenge page not detected"))
                }
            } else {
                Err(FlowError::Unrecognized("no login fields on identity page"))
            }
        }

        LoginState::Challenge => {
            tracing::info!(target: "token", "challenge page detected, falling back to password ...");
            if !page
                .click_button_with_text(PASSWORD_FALLBACK_TEXT, CHALLENGE_BUTTON_TIMEOUT)
                .map_err(FlowError::Browser)?
            {
                return Err(FlowError::Timeout("password fallback control"));
            }
            if !page.wait_for_url(&login_url, LOGIN_URL_TIMEOUT) {
                return Err(FlowError::Timeout("return to login page"));
            }
            if !page.wait_for_css(PASSWORD_INPUT, PASSWORD_FIELD_TIMEOUT) {
                return Err(FlowError::Timeout("password field"));
            }
            page.fill(PASSWORD_INPUT, &creds.password).map_err(FlowError::Browser)?;
            page.click(LOGIN_BUTTON).map_err(FlowError::Browser)?;
            Ok(LoginState::AwaitRedirect)
        }

        LoginState::AwaitRedirect => {
            tracing::info!(target: "token", "waiting for charts redirect ...");
            let overview_url = Regex::new(OVERVIEW_URL_PATTERN).unwrap();
            if page.wait_for_url(&overview_url, REDIRECT_TIMEOUT) {
                page.pause(POST_LOGIN_SETTLE);
                Ok(LoginState::Done)
            } else {
                page.screenshot("login_failed.png");
                Err(FlowError::Timeout("post-login landing page"))
            }
        }

        LoginState::Done => Ok(LoginState::Done),
    }
}

pub fn drive<P: Page>(page: &P, creds: &Credentials) -> Result<(), FlowError> {
    let mut state = LoginState::Start;
    while state != LoginState::Done {
        state = step(page, creds, state)?;
        tracing::debug!(target: "token", "login state -> {state:?}");
    }
    Ok(())
}

/// Devtools-backed [`Page`]. All waits poll the blocking tab API.
pub struct TabPage {
    tab: Arc<Tab>,
}

const POLL_PERIOD: Duration = Duration::from_millis(250);

impl TabPage {
    pub const fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }
}

impl Page for TabPage {
    fn goto(&self, url: &str) -> anyhow::Result<()> {
        self.tab.navigate_to(url)?.wait_until_navigated()?;
        Ok(())
    }

    fn click(&self, css: &str) -> anyhow::Result<()> {
        self.tab.wait_for_element(css)?.click()?;
        Ok(())
    }

    fn fill(&self, css: &str, value: &str) -> anyhow::Result<()> {
        self.tab.wait_for_element(css)?.type_into(value)?;
        Ok(())
    }

    fn is_present(&self, css: &str) -> bool {
        self.tab.find_element(css).is_ok()
    }

    fn wait_for_css(&self, css: &str, timeout: Duration) -> bool {
        self.tab
            .wait_for_element_with_custom_timeout(css, timeout)
            .is_ok()
    }

    fn click_button_with_text(&self, text: &str, timeout: Duration) -> anyhow::Result<bool> {
        let xpath = format!("//button[contains(., \"{text}\")]");
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = self.tab.find_element_by_xpath(&xpath) {
                element.click()?;
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_PERIOD);
        }
    }

    fn wait_for_url(&self, pattern: &Regex, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if pattern.is_match(&self.tab.get_url()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(POLL_PERIOD);
        }
    }

    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn pause(&self, duration: Duration) {
        sleep(duration);
    }

    fn screenshot(&self, file: &str) {
        let shot = self.tab.capture_screenshot(
            CaptureScreenshotFormatOption::Png,
            None,
            None,
            true,
        );
        match shot {
            Ok(png) => {
                if let Err(e) = std::fs::write(file, png) {
                    tracing::warn!(target: "token", "screenshot write failed: {e}");
                } else {
                    tracing::info!(target: "token", "diagnostic screenshot saved to {file}");
                }
            }
            Err(e) => tracing::warn!(target: "token", "screenshot capture failed: {e:?}"),
        }
    }
}

fn drain_last(rx: &mut UnboundedReceiver<CompactString>) -> Option<CompactString> {
    let mut last = None;
    loop {
        match rx.try_recv() {
            Ok(token) => last = Some(token),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => return last,
        }
    }
}

/// Run the whole capture: launch, observe, drive the login flow, persist
/// whatever token the observer saw. Never panics on browser trouble; every
/// failure collapses into a [`CaptureOutcome`] after teardown.
pub fn capture_token(creds: &Credentials, env_path: &Path, headless: bool) -> CaptureOutcome {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let flow = || -> Result<(), FlowError> {
        let browser = browser::launch(headless).map_err(FlowError::Browser)?;
        let tab = browser.new_tab().map_err(FlowError::Browser)?;
        browser::observe(&tab, tx).map_err(FlowError::Browser)?;

        let page = TabPage::new(tab);
        let result = drive(&page, creds);
        if let Err(FlowError::Browser(ref e)) = result {
            tracing::error!(target: "token", "error during login flow: {e:?}");
            page.screenshot("error_during_login.png");
        }
        result
        // browser closes on drop
    };
    let result = flow();

    // the observer may have fired regardless of how the flow ended;
    // last write wins, persisting twice is harmless
    let token = drain_last(&mut rx);
    if let Some(ref token) = token {
        if let Err(e) = config::set_key(env_path, "BEARER_TOKEN", token) {
            tracing::error!(target: "token", "failed to persist BEARER_TOKEN: {e}");
        } else {
            tracing::info!(target: "token", "captured bearer token saved to {}", env_path.display());
        }
    }

    match (result, token) {
        (Ok(()), Some(token)) => CaptureOutcome::Token(token),
        (Ok(()), None) => CaptureOutcome::NoRequestObserved,
        (Err(FlowError::Timeout(what)), _) => {
            tracing::error!(target: "token", "login flow timed out waiting for {what}");
            CaptureOutcome::LoginTimeout
        }
        (Err(FlowError::Unrecognized(what)), _) => {
            tracing::error!(target: "token", "login flow unrecognized: {what}");
            CaptureOutcome::FlowUnrecognized
        }
        (Err(FlowError::Browser(e)), _) => CaptureOutcome::BrowserError(e),
    }
}
