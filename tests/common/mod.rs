#![allow(dead_code)]

use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use foreman::config::PullRequestTemplate;
use foreman::maintenance::{PullRequest, PullRequestHost};
use foreman::runner::{CommandOutput, CommandRunner, CommandSpec};

type Effect = Box<dyn Fn(&CommandSpec) + Send + Sync>;

struct Rule {
    needle: String,
    success: bool,
    stdout: String,
    stderr: String,
    effect: Option<Effect>,
}

/// Answers commands by substring match; unmatched commands succeed silently.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, needle: &str, stderr: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
            effect: None,
        });
        self
    }

    pub fn stdout(mut self, needle: &str, stdout: &str) -> Self {
        self.rules.push(Rule {
            needle: needle.to_string(),
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
            effect: None,
        });
        self
    }

    pub fn effect<F>(mut self, needle: &str, effect: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            needle: needle.to_string(),
            success: true,
            stdout: String::new(),
            stderr: String::new(),
            effect: Some(Box::new(effect)),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ran(&self, needle: &str) -> bool {
        self.calls().iter().any(|c| c.contains(needle))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: &CommandSpec) -> CommandOutput {
        let line = spec.display();
        self.calls.lock().unwrap().push(line.clone());

        match self.rules.iter().find(|r| line.contains(&r.needle)) {
            Some(rule) => {
                if let Some(effect) = &rule.effect {
                    effect(spec);
                }
                CommandOutput {
                    stdout: rule.stdout.clone(),
                    stderr: rule.stderr.clone(),
                    success: rule.success,
                    exit_code: if rule.success { 0 } else { 1 },
                }
            }
            None => CommandOutput {
                success: true,
                ..Default::default()
            },
        }
    }
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run git in `dir` with a fixed identity, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(["-c", "user.name=Test", "-c", "user.email=test@example.com"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

/// Pull request host that keeps opened pull requests in memory.
#[derive(Default)]
pub struct FakeHost {
    pub open: Mutex<Vec<(String, PullRequest)>>,
    pub lookups: Mutex<usize>,
    pub created: Mutex<usize>,
}

impl FakeHost {
    pub fn created(&self) -> usize {
        *self.created.lock().unwrap()
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

impl PullRequestHost for FakeHost {
    fn find_open(&self, head: &str, _base: &str) -> foreman::Result<Option<PullRequest>> {
        *self.lookups.lock().unwrap() += 1;
        Ok(self
            .open
            .lock()
            .unwrap()
            .iter()
            .find(|(branch, _)| branch == head)
            .map(|(_, pr)| pr.clone()))
    }

    fn create(
        &self,
        head: &str,
        _base: &str,
        template: &PullRequestTemplate,
    ) -> foreman::Result<PullRequest> {
        let mut created = self.created.lock().unwrap();
        *created += 1;
        let pr = PullRequest {
            number: *created as u64,
            html_url: format!("https://github.com/karrot-dev/karrot-backend/pull/{}", created),
            title: template.title.clone(),
        };
        self.open.lock().unwrap().push((head.to_string(), pr.clone()));
        Ok(pr)
    }
}
