mod learn_lifecycle;
